use std::env;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

/// Absolute form of `p`, canonical when the path exists.
pub(crate) fn resolve_path(p: &Path) -> io::Result<PathBuf> {
    let joined = if p.is_absolute() {
        p.to_path_buf()
    } else {
        env::current_dir()?.join(p)
    };
    let lexical = lexically_normal(&joined);
    Ok(fs::canonicalize(&lexical).unwrap_or(lexical))
}

fn lexically_normal(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(out.components().next_back(), Some(Component::Normal(_))) {
                    out.pop();
                } else if !out.has_root() {
                    out.push(component.as_os_str());
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
