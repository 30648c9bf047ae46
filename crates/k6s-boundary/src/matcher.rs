//! Shell-style glob matching and project-relative path normalization.

use std::path::{Component, Path};

/// Does `candidate` match `pattern` under shell-glob rules (`*`, `?`,
/// `[...]`, and `**` for any-depth)?
///
/// An unparseable pattern never matches rather than panicking; the
/// caller is expected to have validated configuration patterns ahead of
/// time if that matters to them.
#[must_use]
pub fn glob_match(pattern: &str, candidate: &str) -> bool {
    globset::Glob::new(pattern)
        .map(|glob| glob.compile_matcher().is_match(candidate))
        .unwrap_or(false)
}

/// Resolve `path` to a project-relative, `/`-separated string, lexically
/// collapsing `.`/`..` components without touching the filesystem.
///
/// Returns `Err(())` if the path (once normalized) would escape
/// `root` — either because an absolute path falls outside it, or
/// because `..` components outnumber the preceding normal components.
pub fn to_project_relative(root: &Path, path: &str) -> Result<String, ()> {
    let raw = Path::new(path);
    let relative: &Path = if raw.is_absolute() {
        raw.strip_prefix(root).map_err(|_| ())?
    } else {
        raw
    };

    let mut stack: Vec<&str> = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => {
                stack.push(part.to_str().ok_or(())?);
            }
            Component::ParentDir => {
                if stack.pop().is_none() {
                    return Err(());
                }
            }
            Component::CurDir | Component::Prefix(_) | Component::RootDir => {}
        }
    }
    Ok(stack.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn double_star_matches_any_depth() {
        assert!(glob_match("src/frontend/**", "src/frontend/deep/app.tsx"));
        assert!(!glob_match("src/frontend/**", "src/backend/app.py"));
    }

    #[test]
    fn star_does_not_require_any_depth() {
        assert!(glob_match("frontend-*", "frontend-dev"));
        assert!(!glob_match("frontend-*", "backend-dev"));
    }

    #[test]
    fn relative_path_passes_through() {
        let root = Path::new("/proj");
        assert_eq!(
            to_project_relative(root, "src/x.py").unwrap(),
            "src/x.py"
        );
    }

    #[test]
    fn absolute_path_inside_root_strips_prefix() {
        let root = Path::new("/proj");
        assert_eq!(
            to_project_relative(root, "/proj/src/x.py").unwrap(),
            "src/x.py"
        );
    }

    #[test]
    fn absolute_path_outside_root_is_rejected() {
        let root = Path::new("/proj");
        assert!(to_project_relative(root, "/etc/passwd").is_err());
    }

    #[test]
    fn excess_parent_dirs_escape_and_are_rejected() {
        let root = Path::new("/proj");
        assert!(to_project_relative(root, "../../etc/passwd").is_err());
    }

    #[test]
    fn parent_dir_within_bounds_collapses() {
        let root = Path::new("/proj");
        assert_eq!(
            to_project_relative(root, "src/../lib/mod.rs").unwrap(),
            "lib/mod.rs"
        );
    }
}
