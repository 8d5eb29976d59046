pub mod backend;
pub mod config;
pub mod cursor;
pub mod desktop;
pub mod errors;
pub mod geometry;
pub mod grab;
mod handlers;
pub mod input;
pub mod layout;
pub mod output;
pub mod placement;
pub mod protocols;
pub mod rules;
pub mod state;
pub mod view;
pub mod views;
pub mod workspace;

pub use errors::{CompositorError, Result};
pub use state::Kristal;
