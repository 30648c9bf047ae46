//! Pure mapping from a raw `notify` event to zero or more
//! [`FileChangeEvent`]s, independent of the watching thread itself.

use std::path::Path;

use k6s_core::EventType;
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind};

use crate::events::FileChangeEvent;
use crate::ignore::is_ignored;

/// Turn one raw filesystem event into the (zero, one, or two) synthetic
/// events it represents, already normalized to project-relative paths
/// and filtered by the ignore list and project boundary.
///
/// A correlated rename (`ModifyKind::Name(RenameMode::Both)`, carrying
/// both the old and new path) splits into a `file_delete` for the old
/// path and a `file_create` for the new one, tagged with `old_path`;
/// each half is independently subject to the ignore check. A directory
/// modify event is always discarded — child create/delete events carry
/// the actual information.
#[must_use]
pub fn classify(event: &Event, project_root: &Path) -> Vec<FileChangeEvent> {
    let mut out = classify_raw(event, project_root);
    out.retain(|ev| !(ev.event_type == EventType::FileModify && ev.is_directory));
    out
}

fn classify_raw(event: &Event, project_root: &Path) -> Vec<FileChangeEvent> {
    match &event.kind {
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) if event.paths.len() >= 2 => {
            let mut out = Vec::with_capacity(2);
            if let Some(from) = resolve(&event.paths[0], project_root) {
                out.push(simple(EventType::FileDelete, from, None));
            }
            if let Some(to) = resolve(&event.paths[1], project_root) {
                let old_path = resolve(&event.paths[0], project_root);
                out.push(simple(EventType::FileCreate, to, old_path));
            }
            out
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => event
            .paths
            .first()
            .and_then(|p| resolve(p, project_root))
            .map(|path| vec![simple(EventType::FileDelete, path, None)])
            .unwrap_or_default(),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => event
            .paths
            .first()
            .and_then(|p| resolve(p, project_root))
            .map(|path| vec![simple(EventType::FileCreate, path, None)])
            .unwrap_or_default(),
        EventKind::Create(_) => from_paths(event, project_root, EventType::FileCreate),
        EventKind::Modify(_) => from_paths(event, project_root, EventType::FileModify),
        EventKind::Remove(_) => from_paths(event, project_root, EventType::FileDelete),
        EventKind::Access(_) | EventKind::Other | EventKind::Any => Vec::new(),
    }
}

fn from_paths(event: &Event, project_root: &Path, event_type: EventType) -> Vec<FileChangeEvent> {
    event
        .paths
        .iter()
        .filter_map(|p| resolve(p, project_root))
        .map(|path| simple(event_type, path, None))
        .collect()
}

fn simple(event_type: EventType, resolved: Resolved, old_path: Option<Resolved>) -> FileChangeEvent {
    FileChangeEvent {
        event_type,
        is_directory: resolved.is_directory,
        path: resolved.path,
        old_path: old_path.map(|r| r.path),
    }
}

struct Resolved {
    path: String,
    is_directory: bool,
}

/// Resolve an absolute filesystem path to project-relative, dropping it
/// if it falls outside the project root or matches the ignore list.
///
/// Directory-ness is a best-effort `stat` — it's unavailable once a
/// file has already been removed, in which case we assume a file
/// (directory *modify* events never occur here; directory *delete*
/// mislabeled as a file is harmless since downstream only branches on
/// `is_directory` to discard directory-modify noise).
fn resolve(path: &Path, project_root: &Path) -> Option<Resolved> {
    let raw = path.to_string_lossy();
    let relative = k6s_boundary::to_project_relative(project_root, &raw).ok()?;
    if is_ignored(&relative) {
        return None;
    }
    Some(Resolved {
        is_directory: path.is_dir(),
        path: relative,
    })
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use notify::event::CreateKind;

    use super::*;

    fn root() -> PathBuf {
        PathBuf::from("/proj")
    }

    fn event(kind: EventKind, paths: &[&str]) -> Event {
        let mut ev = Event::new(kind);
        ev.paths = paths.iter().map(PathBuf::from).collect();
        ev
    }

    #[test]
    fn create_event_maps_to_file_create() {
        let ev = event(EventKind::Create(CreateKind::File), &["/proj/src/new.rs"]);
        let out = classify(&ev, &root());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].event_type, EventType::FileCreate);
        assert_eq!(out[0].path, "src/new.rs");
        assert!(out[0].old_path.is_none());
    }

    #[test]
    fn correlated_rename_splits_into_delete_and_create() {
        let ev = event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &["/proj/src/old.rs", "/proj/src/new.rs"],
        );
        let out = classify(&ev, &root());
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].event_type, EventType::FileDelete);
        assert_eq!(out[0].path, "src/old.rs");
        assert_eq!(out[1].event_type, EventType::FileCreate);
        assert_eq!(out[1].path, "src/new.rs");
        assert_eq!(out[1].old_path.as_deref(), Some("src/old.rs"));
    }

    #[test]
    fn rename_half_in_ignored_dir_is_suppressed_independently() {
        let ev = event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &["/proj/.git/old", "/proj/src/new.rs"],
        );
        let out = classify(&ev, &root());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].event_type, EventType::FileCreate);
        assert_eq!(out[0].path, "src/new.rs");
    }

    #[test]
    fn ignored_path_is_dropped() {
        let ev = event(EventKind::Create(CreateKind::File), &["/proj/.git/HEAD"]);
        assert!(classify(&ev, &root()).is_empty());
    }

    #[test]
    fn path_outside_project_root_is_dropped() {
        let ev = event(EventKind::Create(CreateKind::File), &["/etc/passwd"]);
        assert!(classify(&ev, &root()).is_empty());
    }

    #[test]
    fn directory_modify_is_discarded() {
        let mut events = vec![
            FileChangeEvent {
                event_type: EventType::FileModify,
                path: "src".to_string(),
                is_directory: true,
                old_path: None,
            },
            FileChangeEvent {
                event_type: EventType::FileModify,
                path: "src/main.rs".to_string(),
                is_directory: false,
                old_path: None,
            },
        ];
        events.retain(|ev| !(ev.event_type == EventType::FileModify && ev.is_directory));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].path, "src/main.rs");
    }

    #[test]
    fn access_events_are_ignored() {
        let ev = event(
            EventKind::Access(notify::event::AccessKind::Read),
            &["/proj/src/main.rs"],
        );
        assert!(classify(&ev, &root()).is_empty());
    }
}
