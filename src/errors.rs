use thiserror::Error;

use crate::view::ViewId;

#[derive(Debug, Error)]
pub enum CompositorError {
    #[error("backend error: {0}")]
    Backend(String),
    #[error("event loop error: {0}")]
    EventLoop(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("view {0} has no geometry")]
    NoGeometry(ViewId),
}

pub type Result<T, E = CompositorError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn create_dir(path: &std::path::Path) -> Result<()> {
        fs::create_dir_all(path)?;
        Ok(())
    }

    #[test]
    fn io_failures_surface_as_io_errors() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("occupied");
        fs::write(&file, "").unwrap();

        let err = create_dir(&file.join("logs")).unwrap_err();
        assert!(matches!(err, CompositorError::Io(_)));
        assert!(err.to_string().starts_with("io error: "));
        assert!(create_dir(&dir.path().join("logs")).is_ok());
    }
}
