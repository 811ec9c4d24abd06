//! Watch-mode events.
//!
//! Detecting changes is the embedder's job. The pool only consumes the
//! resulting events.

use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WatchEvent {
    /// File was created or modified.
    Changed(PathBuf),
    /// File was deleted.
    Removed(PathBuf),
}

impl WatchEvent {
    pub fn path(&self) -> &Path {
        match self {
            Self::Changed(p) | Self::Removed(p) => p,
        }
    }
}
