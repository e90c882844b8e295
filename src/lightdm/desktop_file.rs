use super::SessionEntry;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// The keys of a session `.desktop` file the greeter cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct DesktopFile {
    name: Option<String>,
    comment: Option<String>,
    exec: Option<String>,
    hidden: bool,
    no_display: bool,
}

impl DesktopFile {
    fn parse(contents: &str) -> Self {
        let mut desktop_file = Self::default();
        let mut in_entry = false;

        for line in contents.lines().map(str::trim) {
            if line.starts_with('[') {
                in_entry = line == "[Desktop Entry]";
                continue;
            }

            if !in_entry {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                continue;
            };

            // localised keys such as `Name[de]` are skipped by the exact match
            match key.trim() {
                "Name" if desktop_file.name.is_none() => {
                    desktop_file.name = Some(value.trim().to_string());
                }
                "Comment" if desktop_file.comment.is_none() => {
                    desktop_file.comment = Some(value.trim().to_string());
                }
                "Exec" if desktop_file.exec.is_none() => {
                    desktop_file.exec = Some(value.trim().to_string());
                }
                "Hidden" => desktop_file.hidden = value.trim() == "true",
                "NoDisplay" => desktop_file.no_display = value.trim() == "true",
                _ => {}
            }
        }

        desktop_file
    }

    fn is_visible(&self) -> bool {
        !self.hidden && !self.no_display && self.exec.is_some()
    }
}

fn is_desktop_file(entry: &DirEntry) -> bool {
    entry.file_type().is_file()
        && entry
            .path()
            .extension()
            .is_some_and(|ext| ext == "desktop")
}

/// Loads every visible session from the `.desktop` files in `dir`.
///
/// The session key is the file name without its extension.
pub fn load_sessions(dir: &Path, session_type: &str) -> Vec<SessionEntry> {
    if !dir.is_dir() {
        debug!("Session directory {} does not exist", dir.display());
        return vec![];
    }

    let mut sessions = WalkDir::new(dir)
        .max_depth(1)
        .follow_links(true)
        .into_iter()
        .filter_map(Result::ok)
        .filter(is_desktop_file)
        .filter_map(|entry| {
            let path = entry.path();
            let key = path.file_stem()?.to_string_lossy().to_string();

            let contents = fs::read_to_string(path)
                .inspect_err(|err| warn!("Failed to read {}: {err}", path.display()))
                .ok()?;

            let desktop_file = DesktopFile::parse(&contents);
            if !desktop_file.is_visible() {
                return None;
            }

            Some(SessionEntry {
                name: desktop_file.name.unwrap_or_else(|| key.clone()),
                comment: desktop_file.comment.unwrap_or_default(),
                session_type: session_type.to_string(),
                key,
            })
        })
        .collect::<Vec<_>>();

    sessions.sort_by(|a, b| a.key.cmp(&b.key));
    sessions
}
