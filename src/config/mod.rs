mod r#impl;

use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};

pub use self::r#impl::{list_themes, resolve_theme_dir};

/// Location of the config file when none is given.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/lightdm/web-greeter.yml";

/// Directory containing the installed themes when none is given.
pub const DEFAULT_THEME_DIR: &str = "/usr/share/web-greeter/themes";

/// Theme used when the configured one cannot be loaded,
/// and by the "use default theme" recovery action.
pub const DEFAULT_THEME: &str = "gruvbox";

/// The configuration snapshot.
///
/// Only `greeter.theme` changes after startup,
/// so the whole value is shared behind a lock.
pub type SharedConfig = Arc<RwLock<Config>>;

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// See [branding options](#branding).
    pub branding: BrandingConfig,

    /// See [greeter options](#greeter).
    pub greeter: GreeterOptions,

    /// Preferred keyboard layouts, as XKB names.
    /// Variants are separated from their layout by whitespace, e.g. `us chr`.
    ///
    /// **Default**: `["us", "latam"]`
    pub layouts: Vec<String>,

    /// See [feature options](#features).
    pub features: FeaturesConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            branding: BrandingConfig::default(),
            greeter: GreeterOptions::default(),
            layouts: vec!["us".to_string(), "latam".to_string()],
            features: FeaturesConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct BrandingConfig {
    /// Path to the directory that contains background images
    /// for use in greeter themes.
    ///
    /// **Default**: `/usr/share/backgrounds`
    pub background_images_dir: String,

    /// Path to the distro logo image for use in greeter themes.
    ///
    /// **Default**: `""`
    pub logo_image: String,

    /// Default user image/avatar.
    /// Used by themes for users that have not configured a `.face` image.
    ///
    /// **Default**: `""`
    pub user_image: String,
}

impl Default for BrandingConfig {
    fn default() -> Self {
        Self {
            background_images_dir: "/usr/share/backgrounds".to_string(),
            logo_image: String::new(),
            user_image: String::new(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct GreeterOptions {
    /// Greeter theme debug mode.
    ///
    /// **Default**: `false`
    pub debug_mode: bool,

    /// Offer to load the default theme when theme errors are detected.
    ///
    /// **Default**: `true`
    pub detect_theme_errors: bool,

    /// Blank the screen after this many seconds of inactivity.
    ///
    /// **Default**: `300`
    pub screensaver_timeout: u32,

    /// Don't allow themes to make remote http requests.
    ///
    /// **Default**: `true`
    pub secure_mode: bool,

    /// The name of the theme to use, or a path to its directory or `index.html`.
    ///
    /// **Default**: `gruvbox`
    pub theme: String,

    /// Icon/cursor theme to use.
    ///
    /// **Default**: `null`
    pub icon_theme: Option<String>,

    /// Language to use when displaying the time,
    /// or empty to use the system's language.
    ///
    /// **Default**: `null`
    pub time_language: Option<String>,
}

impl Default for GreeterOptions {
    fn default() -> Self {
        Self {
            debug_mode: false,
            detect_theme_errors: true,
            screensaver_timeout: 300,
            secure_mode: true,
            theme: DEFAULT_THEME.to_string(),
            icon_theme: None,
            time_language: None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct FeaturesConfig {
    /// Allow the greeter and themes to read battery status.
    ///
    /// **Default**: `false`
    pub battery: bool,

    /// See [backlight options](#backlight).
    pub backlight: BacklightConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct BacklightConfig {
    /// Allow the greeter and themes to control the display backlight.
    ///
    /// **Default**: `false`
    pub enabled: bool,

    /// The amount to increase/decrease brightness by
    /// when using the brightness keys.
    ///
    /// **Default**: `10`
    pub value: i32,

    /// How many steps a brightness change is split into.
    /// `0` or `1` changes the brightness instantly.
    ///
    /// **Default**: `0`
    pub steps: u32,
}

impl Default for BacklightConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            value: 10,
            steps: 0,
        }
    }
}
