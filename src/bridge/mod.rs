//! The accessors exposed to themes over IPC.

mod greeter;
mod greeter_config;
mod objects;
mod router;
mod theme_utils;

pub use greeter::Greeter;
pub use greeter_config::GreeterConfig;
pub use theme_utils::ThemeUtils;

use crate::config::{DEFAULT_THEME, SharedConfig, resolve_theme_dir};
use crate::ipc::{Channel, Prompt};
use crate::windows::Windows;
use crate::{read_lock, write_lock};
use color_eyre::Result;
use router::{Registry, arg_str};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Holds the one instance of each accessor,
/// along with the members they expose.
pub struct Bridge {
    config: SharedConfig,
    theme_root: PathBuf,
    windows: Arc<Windows>,

    greeter: Greeter,
    greeter_registry: Registry<Greeter>,
    greeter_config: GreeterConfig,
    greeter_config_registry: Registry<GreeterConfig>,
    theme_utils: ThemeUtils,
    theme_utils_registry: Registry<ThemeUtils>,
}

impl Bridge {
    pub fn new(
        config: SharedConfig,
        theme_root: PathBuf,
        windows: Arc<Windows>,
        greeter: Greeter,
        greeter_config: GreeterConfig,
        theme_utils: ThemeUtils,
    ) -> Self {
        Self {
            config,
            theme_root,
            windows,
            greeter,
            greeter_registry: Greeter::registry(),
            greeter_config,
            greeter_config_registry: GreeterConfig::registry(),
            theme_utils,
            theme_utils_registry: ThemeUtils::registry(),
        }
    }

    /// Dispatches `args` (`[name, ...args]`) onto the accessor for `channel`.
    ///
    /// Directory listing requested with `invoke` runs without blocking.
    pub async fn call(&self, channel: Channel, args: &[Value], invoke: bool) -> Result<Option<Value>> {
        match channel {
            Channel::Lightdm => self.greeter_registry.dispatch(&self.greeter, args),
            // read-only
            Channel::GreeterConfig => self
                .greeter_config_registry
                .dispatch(&self.greeter_config, args.get(..1).unwrap_or_default()),
            Channel::ThemeUtils if invoke && arg_str(args, 0) == Some("dirlist") => {
                let args = &args[1..];
                let path = arg_str(args, 0).unwrap_or_default();
                let files = self
                    .theme_utils
                    .dirlist_async(path, theme_utils::only_images(args))
                    .await;
                Ok(Some(files.into()))
            }
            Channel::ThemeUtils => self
                .theme_utils_registry
                .dispatch(&self.theme_utils, args),
        }
    }

    /// Handles the button the user picked on a prompt.
    pub fn prompt_response(&self, choice: usize) {
        match choice {
            Prompt::USE_DEFAULT_THEME => {
                write_lock!(self.config).greeter.theme = DEFAULT_THEME.to_string();
                self.reload();
            }
            Prompt::RELOAD_THEME => self.reload(),
            _ => debug!("Prompt dismissed with choice {choice}"),
        }
    }

    fn reload(&self) {
        let theme = read_lock!(self.config).greeter.theme.clone();
        info!("Loading theme '{theme}'");

        self.theme_utils
            .set_theme_dir(resolve_theme_dir(&theme, &self.theme_root));
        self.windows.reload(&theme);
    }
}
