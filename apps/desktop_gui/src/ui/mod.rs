//! UI layer for the desktop GUI: app shell and result textures.

pub mod app;
pub mod textures;

pub use app::{GrainscopeApp, PersistedSettings};
