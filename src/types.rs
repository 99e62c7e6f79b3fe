// src/types.rs

use notify::EventKind;
use serde::Deserialize;

/// Kind of filesystem change a watch binding reacts to.
///
/// - `Add`: a file was created.
/// - `Change`: an existing file was modified (including renames).
/// - `Remove`: a file was deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Add,
    Change,
    #[serde(alias = "unlink")]
    Remove,
}

impl ChangeKind {
    pub const ALL: [ChangeKind; 3] = [ChangeKind::Add, ChangeKind::Change, ChangeKind::Remove];

    /// Map a raw `notify` event kind; access and unknown events map to `None`.
    pub fn from_notify(kind: &EventKind) -> Option<Self> {
        match kind {
            EventKind::Create(_) => Some(ChangeKind::Add),
            EventKind::Modify(_) | EventKind::Any => Some(ChangeKind::Change),
            EventKind::Remove(_) => Some(ChangeKind::Remove),
            EventKind::Access(_) | EventKind::Other => None,
        }
    }
}
