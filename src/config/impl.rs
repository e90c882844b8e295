use super::{Config, DEFAULT_CONFIG_PATH, DEFAULT_THEME};
use crate::cli::Mode;
use color_eyre::eyre::{Result, WrapErr};
use color_eyre::{Help, Report};
use std::fs;
use std::path::{Path, PathBuf};
use std::{env, io};
use tracing::{debug, error, info, instrument, warn};

impl Config {
    /// Attempts to load the config file from `path`,
    /// falling back to `GREETER_BRIDGE_CONFIG`
    /// and then the default location,
    /// and parse it into a new instance of `Self`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = path.map_or_else(
            || {
                env::var("GREETER_BRIDGE_CONFIG")
                    .map_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from)
            },
            Path::to_path_buf,
        );

        Self::load_file(&config_path)
    }

    /// Loads the config, logging the error and falling back
    /// to the default config if it cannot be loaded.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        Self::load(path).unwrap_or_else(|err| {
            error!("{err:?}");
            warn!("Falling back to the default config");
            Self::default()
        })
    }

    /// Loads the YAML config file at the specified path.
    #[instrument]
    fn load_file(path: &Path) -> Result<Self> {
        let file = fs::read(path)
            .wrap_err_with(|| format!("Failed to read config file: {}", path.display()))?;

        let config = serde_norway::from_slice(&file)
            .wrap_err("Invalid YAML config")
            .suggestion("See the `branding`, `greeter`, `layouts` and `features` sections of the example config")?;

        debug!("Loaded config file {}", path.display());
        Ok(config)
    }

    /// Applies the `--mode` and `--theme` command line overrides.
    pub fn apply_overrides(&mut self, mode: Option<Mode>, theme: Option<&str>) {
        if let Some(mode) = mode {
            self.greeter.debug_mode = mode == Mode::Debug;
        }

        if let Some(theme) = theme {
            self.greeter.theme = theme.to_string();
        }
    }
}

/// Resolves the configured theme into the directory containing its `index.html`.
///
/// The theme may be given as a name inside `theme_root`,
/// a path to the theme directory, or a path to its `index.html`.
/// Falls back to the default theme if the configured one has no `index.html`.
pub fn resolve_theme_dir(theme: &str, theme_root: &Path) -> PathBuf {
    let dir = theme_dir_for(theme, theme_root);

    if dir.join("index.html").is_file() || theme == DEFAULT_THEME {
        return dir;
    }

    let report = Report::msg(format!("Theme '{theme}' does not contain an index.html"))
        .suggestion(format!("Themes are located in {}", theme_root.display()));
    warn!("{report:?}");
    info!("Falling back to the default theme '{DEFAULT_THEME}'");

    theme_dir_for(DEFAULT_THEME, theme_root)
}

fn theme_dir_for(theme: &str, theme_root: &Path) -> PathBuf {
    let path = Path::new(theme);

    if path.is_absolute() {
        if path.is_file() {
            path.parent().map_or_else(|| path.to_path_buf(), Path::to_path_buf)
        } else {
            path.to_path_buf()
        }
    } else {
        theme_root.join(theme)
    }
}

/// Lists the names of the installed themes,
/// including symlinks which point to directories.
pub fn list_themes(theme_root: &Path) -> io::Result<Vec<String>> {
    let mut themes = fs::read_dir(theme_root)?
        .flatten()
        .filter(|entry| {
            // `metadata` follows symlinks
            fs::metadata(entry.path()).is_ok_and(|meta| meta.is_dir())
        })
        .filter_map(|entry| entry.file_name().to_str().map(ToString::to_string))
        .collect::<Vec<_>>();

    themes.sort();
    Ok(themes)
}
