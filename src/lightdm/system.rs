use super::{
    DaemonSignal, LanguageEntry, LayoutEntry, NativeLanguage, NativeLayout, NativeSession,
    NativeUser, SessionFacade, desktop_file, locale, passwd, xkb,
};
use crate::error::ERR_NOT_CONNECTED;
use crate::{lock, script};
use cfg_if::cfg_if;
use color_eyre::{Help, Report, Result};
use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

#[cfg(feature = "login1")]
use super::login1::{self, ManagerProxy};

/// Where [`SystemSession`] reads the system state from.
#[derive(Debug, Clone)]
pub struct SystemPaths {
    pub passwd: PathBuf,
    pub accounts_dir: PathBuf,
    pub runtime_dir: PathBuf,
    pub xsessions: PathBuf,
    pub wayland_sessions: PathBuf,
    pub remote_sessions: PathBuf,
    pub rules_list: PathBuf,
    pub keyboard: PathBuf,
    pub locales_dir: PathBuf,
    pub hostname: PathBuf,
}

impl Default for SystemPaths {
    fn default() -> Self {
        Self {
            passwd: PathBuf::from("/etc/passwd"),
            accounts_dir: PathBuf::from("/var/lib/AccountsService/users"),
            runtime_dir: PathBuf::from("/run/user"),
            xsessions: PathBuf::from("/usr/share/xsessions"),
            wayland_sessions: PathBuf::from("/usr/share/wayland-sessions"),
            remote_sessions: PathBuf::from("/usr/share/lightdm/remote-sessions"),
            rules_list: PathBuf::from("/usr/share/X11/xkb/rules/evdev.lst"),
            keyboard: PathBuf::from("/etc/default/keyboard"),
            locales_dir: PathBuf::from("/usr/share/i18n/locales"),
            hostname: PathBuf::from("/proc/sys/kernel/hostname"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum PowerAction {
    Hibernate,
    Restart,
    Shutdown,
    Suspend,
}

/// Session facade backed by the operating system.
///
/// Users, sessions, layouts and languages are read from the system,
/// and power actions go through logind.
/// The greeter daemon protocol itself is not spoken,
/// so every operation that needs the daemon reports that it is not connected.
pub struct SystemSession {
    paths: SystemPaths,
    layout: Mutex<Option<LayoutEntry>>,
    layouts: OnceLock<Vec<LayoutEntry>>,
    languages: OnceLock<Vec<LanguageEntry>>,
    signals: broadcast::Sender<DaemonSignal>,
    #[cfg(feature = "login1")]
    login1: Option<ManagerProxy<'static>>,
}

impl SystemSession {
    /// Creates a session reading from `paths`, without logind.
    pub fn with_paths(paths: SystemPaths) -> Self {
        let (signals, _) = broadcast::channel(32);

        Self {
            paths,
            layout: Mutex::new(None),
            layouts: OnceLock::new(),
            languages: OnceLock::new(),
            signals,
            #[cfg(feature = "login1")]
            login1: None,
        }
    }

    /// Creates a session reading from the standard system locations,
    /// connecting to logind when available.
    pub async fn new() -> Self {
        #[allow(unused_mut)]
        let mut session = Self::with_paths(SystemPaths::default());

        #[cfg(feature = "login1")]
        {
            session.login1 = match Self::connect_login1().await {
                Ok(proxy) => Some(proxy),
                Err(err) => {
                    warn!("{err:?}");
                    None
                }
            };
        }

        session
    }

    #[cfg(feature = "login1")]
    async fn connect_login1() -> Result<ManagerProxy<'static>> {
        let dbus = Box::pin(zbus::Connection::system())
            .await
            .map_err(|err| Report::new(err).wrap_err("Failed to connect to the system bus"))?;

        let proxy = ManagerProxy::new(&dbus).await?;
        debug!("Connected to logind");

        Ok(proxy)
    }

    fn not_connected<T>() -> Result<T> {
        Err(Report::msg(ERR_NOT_CONNECTED))
    }

    fn cached_layouts(&self) -> &[LayoutEntry] {
        self.layouts
            .get_or_init(|| xkb::load_layouts(&self.paths.rules_list))
    }

    /// The layout last set, or else the system keyboard default.
    fn current_layout(&self) -> LayoutEntry {
        lock!(self.layout).clone().unwrap_or_else(|| {
            let name = xkb::default_layout(&self.paths.keyboard)
                .unwrap_or_else(|| "us".to_string());
            LayoutEntry {
                short_description: name.clone(),
                description: String::new(),
                name,
            }
        })
    }
}

cfg_if! {
    if #[cfg(feature = "login1")] {
        impl SystemSession {
            fn can(&self, action: PowerAction) -> bool {
                let Some(manager) = &self.login1 else {
                    return false;
                };

                let answer = crate::await_sync(async {
                    match action {
                        PowerAction::Hibernate => manager.can_hibernate().await,
                        PowerAction::Restart => manager.can_reboot().await,
                        PowerAction::Shutdown => manager.can_power_off().await,
                        PowerAction::Suspend => manager.can_suspend().await,
                    }
                });

                match answer {
                    Ok(answer) => login1::is_allowed(&answer),
                    Err(err) => {
                        warn!("Failed to query logind for {action:?}: {err}");
                        false
                    }
                }
            }

            fn perform(&self, action: PowerAction) -> Result<bool> {
                let Some(manager) = &self.login1 else {
                    return Ok(false);
                };

                info!("Requesting {action:?} from logind");
                crate::await_sync(async {
                    match action {
                        PowerAction::Hibernate => manager.hibernate(false).await,
                        PowerAction::Restart => manager.reboot(false).await,
                        PowerAction::Shutdown => manager.power_off(false).await,
                        PowerAction::Suspend => manager.suspend(false).await,
                    }
                })?;

                Ok(true)
            }
        }
    } else {
        impl SystemSession {
            #[allow(clippy::unused_self)]
            const fn can(&self, _action: PowerAction) -> bool {
                false
            }

            #[allow(clippy::unused_self)]
            fn perform(&self, action: PowerAction) -> Result<bool> {
                info!("Ignoring {action:?}, logind support is disabled");
                Ok(false)
            }
        }
    }
}

/// Arguments selecting `name` (`layout` or `layout\tvariant`) with `setxkbmap`.
fn setxkbmap_args(name: &str) -> Vec<&str> {
    match name.split_once('\t') {
        Some((layout, variant)) => vec!["-layout", layout, "-variant", variant],
        None => vec!["-layout", name],
    }
}

impl SessionFacade for SystemSession {
    fn connect_to_daemon(&self) -> Result<()> {
        if env::var_os("LIGHTDM_TO_SERVER_FD").is_none() {
            return Err(Report::msg("Greeter was not started by the LightDM daemon")
                .note("LIGHTDM_TO_SERVER_FD is not set"));
        }

        Err(
            Report::msg("The LightDM greeter protocol is not supported by this session backend")
                .suggestion("Users, sessions and power actions are still available"),
        )
    }

    fn subscribe(&self) -> broadcast::Receiver<DaemonSignal> {
        self.signals.subscribe()
    }

    fn authenticate(&self, _username: Option<&str>) -> Result<bool> {
        Self::not_connected()
    }

    fn authenticate_as_guest(&self) -> Result<bool> {
        Self::not_connected()
    }

    fn cancel_authentication(&self) -> Result<bool> {
        Self::not_connected()
    }

    fn cancel_autologin(&self) -> Result<bool> {
        Self::not_connected()
    }

    fn respond(&self, _response: &str) -> Result<bool> {
        Self::not_connected()
    }

    fn start_session(&self, _session: Option<&str>) -> Result<bool> {
        Self::not_connected()
    }

    fn set_language(&self, _language: &str) -> Result<bool> {
        Self::not_connected()
    }

    fn ensure_shared_data_dir(&self, _username: &str) -> Result<String> {
        Self::not_connected()
    }

    fn authentication_user(&self) -> Option<String> {
        None
    }

    fn in_authentication(&self) -> bool {
        false
    }

    fn is_authenticated(&self) -> bool {
        false
    }

    fn autologin_guest_hint(&self) -> bool {
        false
    }

    fn autologin_timeout_hint(&self) -> i32 {
        0
    }

    fn autologin_user_hint(&self) -> Option<String> {
        None
    }

    fn default_session_hint(&self) -> Option<String> {
        None
    }

    fn has_guest_account_hint(&self) -> bool {
        false
    }

    fn hide_users_hint(&self) -> bool {
        false
    }

    fn lock_hint(&self) -> bool {
        false
    }

    fn select_guest_hint(&self) -> bool {
        false
    }

    fn select_user_hint(&self) -> Option<String> {
        None
    }

    fn show_manual_login_hint(&self) -> bool {
        false
    }

    fn show_remote_login_hint(&self) -> bool {
        false
    }

    fn users(&self) -> Vec<Box<dyn NativeUser>> {
        passwd::load_users(
            &self.paths.passwd,
            &self.paths.accounts_dir,
            &self.paths.runtime_dir,
        )
        .into_iter()
        .map(|user| Box::new(user) as Box<dyn NativeUser>)
        .collect()
    }

    fn hostname(&self) -> String {
        fs::read_to_string(&self.paths.hostname)
            .map(|hostname| hostname.trim().to_string())
            .unwrap_or_else(|err| {
                warn!("Failed to read hostname: {err}");
                String::new()
            })
    }

    fn can_hibernate(&self) -> bool {
        self.can(PowerAction::Hibernate)
    }

    fn can_restart(&self) -> bool {
        self.can(PowerAction::Restart)
    }

    fn can_shutdown(&self) -> bool {
        self.can(PowerAction::Shutdown)
    }

    fn can_suspend(&self) -> bool {
        self.can(PowerAction::Suspend)
    }

    fn hibernate(&self) -> Result<bool> {
        self.perform(PowerAction::Hibernate)
    }

    fn restart(&self) -> Result<bool> {
        self.perform(PowerAction::Restart)
    }

    fn shutdown(&self) -> Result<bool> {
        self.perform(PowerAction::Shutdown)
    }

    fn suspend(&self) -> Result<bool> {
        self.perform(PowerAction::Suspend)
    }

    fn language(&self) -> Option<Box<dyn NativeLanguage>> {
        let code = env::var("LANG").ok().filter(|lang| !lang.is_empty())?;
        Some(Box::new(locale::language_for(&code, &self.paths.locales_dir)))
    }

    fn languages(&self) -> Vec<Box<dyn NativeLanguage>> {
        self.languages
            .get_or_init(|| {
                locale::installed_locales()
                    .iter()
                    .map(|code| locale::language_for(code, &self.paths.locales_dir))
                    .collect()
            })
            .iter()
            .cloned()
            .map(|language| Box::new(language) as Box<dyn NativeLanguage>)
            .collect()
    }

    fn layout(&self) -> Option<Box<dyn NativeLayout>> {
        let current = self.current_layout();

        let layout = self
            .cached_layouts()
            .iter()
            .find(|layout| layout.name == current.name)
            .cloned()
            .unwrap_or(current);

        Some(Box::new(layout))
    }

    fn layouts(&self) -> Vec<Box<dyn NativeLayout>> {
        self.cached_layouts()
            .iter()
            .cloned()
            .map(|layout| Box::new(layout) as Box<dyn NativeLayout>)
            .collect()
    }

    fn set_layout(&self, layout: LayoutEntry) -> Result<()> {
        debug!("Switching keyboard layout to '{}'", layout.name);
        if let Err(err) = script::exec_command("setxkbmap", &setxkbmap_args(&layout.name)) {
            error!("{err:?}");
        }

        *lock!(self.layout) = Some(layout);
        Ok(())
    }

    fn sessions(&self) -> Vec<Box<dyn NativeSession>> {
        desktop_file::load_sessions(&self.paths.xsessions, "x")
            .into_iter()
            .chain(desktop_file::load_sessions(&self.paths.wayland_sessions, "wayland"))
            .map(|session| Box::new(session) as Box<dyn NativeSession>)
            .collect()
    }

    fn remote_sessions(&self) -> Vec<Box<dyn NativeSession>> {
        desktop_file::load_sessions(&self.paths.remote_sessions, "remote")
            .into_iter()
            .map(|session| Box::new(session) as Box<dyn NativeSession>)
            .collect()
    }
}
