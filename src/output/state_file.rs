//! Persisted per-output configuration, one `name enabled scale transform x y` line per output.

use std::{fmt::Write as _, fs, path::Path};

use anyhow::Context;

#[derive(Clone, Debug, PartialEq)]
pub struct SavedOutput {
    pub name: String,
    pub enabled: bool,
    pub scale: f64,
    /// wl_output transform value, 0..=7.
    pub transform: u32,
    pub x: i32,
    pub y: i32,
}

impl SavedOutput {
    fn parse_line(line: &str) -> Option<Self> {
        let mut fields = line.split_whitespace();
        let name = fields.next()?;
        let enabled: i32 = fields.next()?.parse().ok()?;
        let scale: f64 = fields.next()?.parse().ok()?;
        let transform: i64 = fields.next()?.parse().ok()?;
        let x: i32 = fields.next()?.parse().ok()?;
        let y: i32 = fields.next()?.parse().ok()?;

        Some(Self {
            name: name.to_owned(),
            enabled: enabled != 0,
            scale: if scale > 0.0 { scale } else { 1.0 },
            transform: u32::try_from(transform).ok().filter(|t| *t <= 7).unwrap_or(0),
            x,
            y,
        })
    }
}

/// Every complete line of the file. A missing file holds no entries.
pub fn load_all(path: &Path) -> anyhow::Result<Vec<SavedOutput>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read output state {}", path.display()))?;

    Ok(contents.lines().filter_map(SavedOutput::parse_line).collect())
}

/// First entry for `name`.
pub fn load(path: &Path, name: &str) -> anyhow::Result<Option<SavedOutput>> {
    Ok(load_all(path)?.into_iter().find(|saved| saved.name == name))
}

pub fn save(path: &Path, outputs: &[SavedOutput]) -> anyhow::Result<()> {
    let mut contents = String::new();
    for output in outputs {
        writeln!(
            contents,
            "{} {} {:.3} {} {} {}",
            output.name,
            u8::from(output.enabled),
            output.scale,
            output.transform,
            output.x,
            output.y
        )?;
    }

    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(path, contents)
        .with_context(|| format!("failed to write output state {}", path.display()))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn saves_and_loads_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("outputs");
        let outputs = vec![
            SavedOutput {
                name: "eDP-1".into(),
                enabled: true,
                scale: 1.5,
                transform: 1,
                x: 0,
                y: 0,
            },
            SavedOutput {
                name: "DP-2".into(),
                enabled: false,
                scale: 1.0,
                transform: 0,
                x: 1280,
                y: -200,
            },
        ];
        save(&path, &outputs).unwrap();

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "eDP-1 1 1.500 1 0 0\nDP-2 0 1.000 0 1280 -200\n"
        );
        assert_eq!(load(&path, "DP-2").unwrap(), Some(outputs[1].clone()));
        assert_eq!(load(&path, "DP").unwrap(), None);
    }

    #[test]
    fn sanitizes_loaded_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("outputs");
        fs::write(&path, "A 1 2.0\nA 5 -1 9 10 20\nB 1 1.0 3 0 0\n").unwrap();

        let a = load(&path, "A").unwrap().unwrap();
        assert_eq!(a.scale, 1.0);
        assert_eq!(a.transform, 0);
        assert!(a.enabled);
        assert_eq!((a.x, a.y), (10, 20));
        assert_eq!(load(&path, "B").unwrap().unwrap().transform, 3);
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(load(&dir.path().join("nope"), "A").unwrap(), None);
    }
}
