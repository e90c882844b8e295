use super::router::{Registry, arg_str};
use crate::config::SharedConfig;
use crate::{read_lock, write_lock};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::{env, fs};
use tracing::{debug, warn};

const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "gif", "bmp", "webp"];

/// The `theme_utils` accessor.
///
/// Lets themes list directories, as long as they are inside
/// the theme, background, shared data or temp directories.
pub struct ThemeUtils {
    config: SharedConfig,
    theme_root: PathBuf,
    theme_dir: RwLock<PathBuf>,
    shared_data_directory: String,
    temp_dir: PathBuf,
}

impl ThemeUtils {
    pub fn new(
        config: SharedConfig,
        theme_root: PathBuf,
        theme_dir: PathBuf,
        shared_data_directory: String,
    ) -> Self {
        Self {
            config,
            theme_root,
            theme_dir: RwLock::new(theme_dir),
            shared_data_directory,
            temp_dir: env::temp_dir(),
        }
    }

    /// Points relative paths at a newly loaded theme.
    pub fn set_theme_dir(&self, theme_dir: PathBuf) {
        *write_lock!(self.theme_dir) = theme_dir;
    }

    /// Lists the entries of the directory at `path`.
    ///
    /// Returns an empty list for any path outside the allowed directories.
    pub fn dirlist(&self, path: &str, only_images: bool) -> Vec<String> {
        let Some(requested) = self.requested_path(path) else {
            return vec![];
        };

        let dir = match fs::canonicalize(&requested) {
            Ok(dir) if dir.is_dir() => dir,
            Ok(_) => {
                debug!("{} is not a directory", requested.display());
                return vec![];
            }
            Err(err) => {
                debug!("Cannot resolve {}: {err}", requested.display());
                return vec![];
            }
        };

        let allowlist = self
            .allowlist()
            .into_iter()
            .filter_map(|entry| fs::canonicalize(entry).ok())
            .collect::<Vec<_>>();

        if !is_allowed(&dir, &allowlist) {
            warn!("Listing {} is not allowed", dir.display());
            return vec![];
        }

        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) => {
                warn!("Failed to read {}: {err}", dir.display());
                return vec![];
            }
        };

        let mut files = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| !only_images || (is_image_name(path) && path.is_file()))
            .map(|path| path.to_string_lossy().to_string())
            .collect::<Vec<_>>();

        files.sort();
        files
    }

    /// Same as [`Self::dirlist`], without blocking on the filesystem.
    pub async fn dirlist_async(&self, path: &str, only_images: bool) -> Vec<String> {
        let Some(requested) = self.requested_path(path) else {
            return vec![];
        };

        let dir = match tokio::fs::canonicalize(&requested).await {
            Ok(dir) => dir,
            Err(err) => {
                debug!("Cannot resolve {}: {err}", requested.display());
                return vec![];
            }
        };

        if !tokio::fs::metadata(&dir)
            .await
            .is_ok_and(|metadata| metadata.is_dir())
        {
            debug!("{} is not a directory", dir.display());
            return vec![];
        }

        let mut allowlist = vec![];
        for entry in self.allowlist() {
            if let Ok(entry) = tokio::fs::canonicalize(entry).await {
                allowlist.push(entry);
            }
        }

        if !is_allowed(&dir, &allowlist) {
            warn!("Listing {} is not allowed", dir.display());
            return vec![];
        }

        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(err) => {
                warn!("Failed to read {}: {err}", dir.display());
                return vec![];
            }
        };

        let mut files = vec![];
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();

            if only_images {
                let is_file = tokio::fs::metadata(&path)
                    .await
                    .is_ok_and(|metadata| metadata.is_file());
                if !is_file || !is_image_name(&path) {
                    continue;
                }
            }

            files.push(path.to_string_lossy().to_string());
        }

        files.sort();
        files
    }

    /// Validates the requested string and resolves `./` paths
    /// against the theme directory.
    fn requested_path(&self, path: &str) -> Option<PathBuf> {
        if path.is_empty() || path == "/" {
            debug!("Refusing to list '{path}'");
            return None;
        }

        let requested = if let Some(relative) = path.strip_prefix("./") {
            read_lock!(self.theme_dir).join(relative)
        } else {
            PathBuf::from(path)
        };

        if requested.is_absolute() {
            Some(requested)
        } else {
            debug!("Refusing to list relative path '{path}'");
            None
        }
    }

    /// The directories themes may read from, before canonicalization.
    fn allowlist(&self) -> Vec<PathBuf> {
        let background_images_dir = read_lock!(self.config)
            .branding
            .background_images_dir
            .clone();

        [
            self.theme_root.clone(),
            PathBuf::from(background_images_dir),
            PathBuf::from(&self.shared_data_directory),
            read_lock!(self.theme_dir).clone(),
            self.temp_dir.clone(),
        ]
        .into_iter()
        .filter(|entry| !entry.as_os_str().is_empty())
        .collect()
    }

    pub fn registry() -> Registry<Self> {
        Registry::<Self>::new().method("dirlist", |utils, args| {
            let path = arg_str(args, 0).unwrap_or_default();
            let only_images = only_images(args);
            Ok(Some(utils.dirlist(path, only_images).into()))
        })
    }
}

/// Reads the `only_images` argument of `dirlist`, which defaults to true.
pub fn only_images(args: &[Value]) -> bool {
    args.get(1).and_then(Value::as_bool).unwrap_or(true)
}

/// Whether `dir` is inside one of the `allowlist` directories.
/// Both sides must already be canonical.
fn is_allowed(dir: &Path, allowlist: &[PathBuf]) -> bool {
    allowlist.iter().any(|allowed| dir.starts_with(allowed))
}

/// Whether the file name has a name and an image extension.
fn is_image_name(path: &Path) -> bool {
    let has_stem = path
        .file_stem()
        .is_some_and(|stem| !stem.is_empty());

    let has_extension = path
        .extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|image| image.eq_ignore_ascii_case(extension))
        });

    has_stem && has_extension
}
