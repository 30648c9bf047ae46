//! The synthetic file-change event shape the watcher emits.

use k6s_core::EventType;

/// One file-change event, already normalized to a project-relative
/// path and resolved against the ignore rules.
#[derive(Debug, Clone)]
pub struct FileChangeEvent {
    /// Which kind of change this is. Always one of `FileCreate`,
    /// `FileModify`, or `FileDelete` — directory events never reach
    /// this type.
    pub event_type: EventType,
    /// Project-relative path affected.
    pub path: String,
    /// Whether the changed entry is a directory.
    pub is_directory: bool,
    /// For the `file_create` half of a rename/move, the path it was
    /// renamed from.
    pub old_path: Option<String>,
}
