//! The native session facade.
//!
//! Everything the greeter knows about the login daemon,
//! the users and the machine goes through [`SessionFacade`].
//! Values are handed out as opaque handles
//! which are turned into plain records by `bridge::objects`.

mod desktop_file;
mod locale;
#[cfg(feature = "login1")]
mod login1;
mod passwd;
mod system;
#[cfg(test)]
pub mod test_session;
mod xkb;

use color_eyre::Result;
use tokio::sync::broadcast;

pub use system::SystemSession;

/// Signals emitted by the login daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DaemonSignal {
    AuthenticationComplete,
    AutologinTimerExpired,
    ShowMessage { text: String, message_type: i32 },
    ShowPrompt { text: String, prompt_type: i32 },
    Idle,
    Reset,
}

impl DaemonSignal {
    /// The name themes subscribe to.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::AuthenticationComplete => "authentication-complete",
            Self::AutologinTimerExpired => "autologin-timer-expired",
            Self::ShowMessage { .. } => "show-message",
            Self::ShowPrompt { .. } => "show-prompt",
            Self::Idle => "idle",
            Self::Reset => "reset",
        }
    }

    /// Positional arguments passed to the theme's handlers.
    pub fn args(&self) -> Vec<serde_json::Value> {
        match self {
            Self::ShowMessage {
                text,
                message_type: kind,
            }
            | Self::ShowPrompt {
                text,
                prompt_type: kind,
            } => vec![text.as_str().into(), (*kind).into()],
            _ => vec![],
        }
    }
}

pub trait NativeUser: Send + Sync {
    fn background(&self) -> String;
    fn display_name(&self) -> String;
    fn home_directory(&self) -> String;
    fn image(&self) -> String;
    fn language(&self) -> String;
    fn layout(&self) -> String;
    fn layouts(&self) -> Vec<String>;
    fn logged_in(&self) -> bool;
    fn session(&self) -> String;
    fn username(&self) -> String;
}

pub trait NativeSession: Send + Sync {
    fn comment(&self) -> String;
    fn key(&self) -> String;
    fn name(&self) -> String;
    fn session_type(&self) -> String;
}

pub trait NativeLanguage: Send + Sync {
    fn code(&self) -> String;
    fn name(&self) -> String;
    fn territory(&self) -> String;
}

pub trait NativeLayout: Send + Sync {
    fn description(&self) -> String;
    fn name(&self) -> String;
    fn short_description(&self) -> String;
}

/// The operations and state the greeter needs from the login daemon.
///
/// Operations that need the daemon return an error
/// when there is no connection to it.
pub trait SessionFacade: Send + Sync {
    /// Connects to the login daemon.
    fn connect_to_daemon(&self) -> Result<()>;

    /// Subscribes to the daemon's signals.
    /// Dropping the receiver unsubscribes.
    fn subscribe(&self) -> broadcast::Receiver<DaemonSignal>;

    fn authenticate(&self, username: Option<&str>) -> Result<bool>;
    fn authenticate_as_guest(&self) -> Result<bool>;
    fn cancel_authentication(&self) -> Result<bool>;
    fn cancel_autologin(&self) -> Result<bool>;
    fn respond(&self, response: &str) -> Result<bool>;
    fn start_session(&self, session: Option<&str>) -> Result<bool>;
    fn set_language(&self, language: &str) -> Result<bool>;

    /// Ensures the shared data directory for `username` exists,
    /// returning its path.
    fn ensure_shared_data_dir(&self, username: &str) -> Result<String>;

    fn authentication_user(&self) -> Option<String>;
    fn in_authentication(&self) -> bool;
    fn is_authenticated(&self) -> bool;

    fn autologin_guest_hint(&self) -> bool;
    fn autologin_timeout_hint(&self) -> i32;
    fn autologin_user_hint(&self) -> Option<String>;
    fn default_session_hint(&self) -> Option<String>;
    fn has_guest_account_hint(&self) -> bool;
    fn hide_users_hint(&self) -> bool;
    fn lock_hint(&self) -> bool;
    fn select_guest_hint(&self) -> bool;
    fn select_user_hint(&self) -> Option<String>;
    fn show_manual_login_hint(&self) -> bool;
    fn show_remote_login_hint(&self) -> bool;

    fn users(&self) -> Vec<Box<dyn NativeUser>>;
    fn hostname(&self) -> String;

    fn can_hibernate(&self) -> bool;
    fn can_restart(&self) -> bool;
    fn can_shutdown(&self) -> bool;
    fn can_suspend(&self) -> bool;
    fn hibernate(&self) -> Result<bool>;
    fn restart(&self) -> Result<bool>;
    fn shutdown(&self) -> Result<bool>;
    fn suspend(&self) -> Result<bool>;

    fn language(&self) -> Option<Box<dyn NativeLanguage>>;
    fn languages(&self) -> Vec<Box<dyn NativeLanguage>>;
    fn layout(&self) -> Option<Box<dyn NativeLayout>>;
    fn layouts(&self) -> Vec<Box<dyn NativeLayout>>;
    /// Switches the active keyboard layout.
    fn set_layout(&self, layout: LayoutEntry) -> Result<()>;
    fn sessions(&self) -> Vec<Box<dyn NativeSession>>;
    fn remote_sessions(&self) -> Vec<Box<dyn NativeSession>>;
}

/// A plain session record, used by the readers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionEntry {
    pub key: String,
    pub name: String,
    pub comment: String,
    pub session_type: String,
}

impl NativeSession for SessionEntry {
    fn comment(&self) -> String {
        self.comment.clone()
    }

    fn key(&self) -> String {
        self.key.clone()
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    fn session_type(&self) -> String {
        self.session_type.clone()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LanguageEntry {
    pub code: String,
    pub name: String,
    pub territory: String,
}

impl NativeLanguage for LanguageEntry {
    fn code(&self) -> String {
        self.code.clone()
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    fn territory(&self) -> String {
        self.territory.clone()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayoutEntry {
    /// XKB name. Variants are `layout\tvariant`.
    pub name: String,
    pub short_description: String,
    pub description: String,
}

impl NativeLayout for LayoutEntry {
    fn description(&self) -> String {
        self.description.clone()
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    fn short_description(&self) -> String {
        self.short_description.clone()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserEntry {
    pub background: String,
    pub display_name: String,
    pub home_directory: String,
    pub image: String,
    pub language: String,
    pub layout: String,
    pub layouts: Vec<String>,
    pub logged_in: bool,
    pub session: String,
    pub username: String,
}

impl NativeUser for UserEntry {
    fn background(&self) -> String {
        self.background.clone()
    }

    fn display_name(&self) -> String {
        self.display_name.clone()
    }

    fn home_directory(&self) -> String {
        self.home_directory.clone()
    }

    fn image(&self) -> String {
        self.image.clone()
    }

    fn language(&self) -> String {
        self.language.clone()
    }

    fn layout(&self) -> String {
        self.layout.clone()
    }

    fn layouts(&self) -> Vec<String> {
        self.layouts.clone()
    }

    fn logged_in(&self) -> bool {
        self.logged_in
    }

    fn session(&self) -> String {
        self.session.clone()
    }

    fn username(&self) -> String {
        self.username.clone()
    }
}
