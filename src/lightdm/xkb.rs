use super::LayoutEntry;
use std::fs;
use std::path::Path;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Layout,
    Variant,
    Other,
}

/// Parses an XKB rules list (`evdev.lst`) into its layouts and variants.
///
/// Variants are named `layout\tvariant`, as the login daemon names them.
fn parse_rules_list(contents: &str) -> Vec<LayoutEntry> {
    let mut section = Section::Other;
    let mut layouts = vec![];

    for line in contents.lines() {
        if let Some(header) = line.strip_prefix('!') {
            section = match header.trim() {
                "layout" => Section::Layout,
                "variant" => Section::Variant,
                _ => Section::Other,
            };
            continue;
        }

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let Some((name, description)) = line.split_once(char::is_whitespace) else {
            continue;
        };
        let description = description.trim();

        match section {
            Section::Layout => layouts.push(LayoutEntry {
                name: name.to_string(),
                short_description: name.to_string(),
                description: description.to_string(),
            }),
            Section::Variant => {
                let Some((layout, description)) = description.split_once(':') else {
                    continue;
                };

                layouts.push(LayoutEntry {
                    name: format!("{layout}\t{name}"),
                    short_description: name.to_string(),
                    description: description.trim().to_string(),
                });
            }
            Section::Other => {}
        }
    }

    layouts
}

pub fn load_layouts(rules_list: &Path) -> Vec<LayoutEntry> {
    match fs::read_to_string(rules_list) {
        Ok(contents) => parse_rules_list(&contents),
        Err(err) => {
            warn!("Failed to read {}: {err}", rules_list.display());
            vec![]
        }
    }
}

/// Reads the configured system layout from a `/etc/default/keyboard` style file,
/// as a daemon layout name.
pub fn default_layout(keyboard: &Path) -> Option<String> {
    let contents = fs::read_to_string(keyboard).ok()?;

    let value = |key: &str| {
        contents.lines().find_map(|line| {
            line.trim()
                .strip_prefix(key)
                .and_then(|rest| rest.strip_prefix('='))
                .map(|value| value.trim_matches('"').to_string())
        })
    };

    // only the first of a comma-separated list is active
    let layout = value("XKBLAYOUT")?
        .split(',')
        .next()
        .filter(|layout| !layout.is_empty())?
        .to_string();

    let variant = value("XKBVARIANT")
        .and_then(|variant| variant.split(',').next().map(ToString::to_string))
        .filter(|variant| !variant.is_empty());

    Some(match variant {
        Some(variant) => format!("{layout}\t{variant}"),
        None => layout,
    })
}
