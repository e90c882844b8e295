use super::LanguageEntry;
use crate::script::exec_command;
use std::fs;
use std::path::Path;
use tracing::warn;

/// Lists the installed locales using `locale -a`.
pub fn installed_locales() -> Vec<String> {
    exec_command("locale", &["-a"])
        .map(|output| parse_locale_list(&output))
        .unwrap_or_else(|err| {
            warn!("{err:?}");
            vec![]
        })
}

/// Keeps the UTF-8 locales, dropping `C` and `POSIX`.
fn parse_locale_list(output: &str) -> Vec<String> {
    let mut locales = output
        .lines()
        .map(str::trim)
        .filter(|locale| {
            let lower = locale.to_lowercase();
            lower.ends_with(".utf8") || lower.ends_with(".utf-8")
        })
        .filter(|locale| !locale.starts_with("C.") && !locale.starts_with("POSIX"))
        .map(ToString::to_string)
        .collect::<Vec<_>>();

    locales.sort();
    locales.dedup();
    locales
}

/// Reads the `language` and `territory` of a locale definition's
/// `LC_IDENTIFICATION` section.
fn parse_identification(contents: &str) -> (Option<String>, Option<String>) {
    let mut language = None;
    let mut territory = None;
    let mut in_section = false;

    for line in contents.lines().map(str::trim) {
        match line {
            "LC_IDENTIFICATION" => in_section = true,
            "END LC_IDENTIFICATION" => break,
            _ if in_section => {
                let Some((key, value)) = line.split_once(char::is_whitespace) else {
                    continue;
                };

                let value = Some(value.trim().trim_matches('"').to_string());
                match key {
                    "language" => language = value,
                    "territory" => territory = value,
                    _ => {}
                }
            }
            _ => {}
        }
    }

    (language, territory)
}

/// Builds the language record for `code`,
/// using the locale definitions in `locales_dir` for its names.
pub fn language_for(code: &str, locales_dir: &Path) -> LanguageEntry {
    let base = code.split(['.', '@']).next().unwrap_or(code);

    let (name, territory) = fs::read_to_string(locales_dir.join(base))
        .map(|contents| parse_identification(&contents))
        .unwrap_or_default();

    LanguageEntry {
        code: code.to_string(),
        name: name.unwrap_or_else(|| base.to_string()),
        territory: territory.unwrap_or_default(),
    }
}
