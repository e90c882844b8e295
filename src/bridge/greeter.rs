use super::objects::{
    battery_to_object, language_to_object, languages_to_objects, layout_to_object,
    layouts_to_objects, sessions_to_objects, users_to_objects,
};
use super::router::{Registry, arg_i32, arg_str};
use crate::channels::BroadcastReceiverExt;
use crate::clients::MonitorEvent;
use crate::clients::battery::BatteryController;
use crate::clients::brightness::BrightnessController;
use crate::clients::screensaver::Screensaver;
use crate::config::FeaturesConfig;
use crate::ipc::Prompt;
use crate::lightdm::{DaemonSignal, LayoutEntry, SessionFacade};
use crate::windows::Windows;
use color_eyre::Result;
use serde_json::{Value, json};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// The `lightdm` accessor themes use to log in.
///
/// Wraps the session facade, the hardware monitors and the screensaver.
pub struct Greeter {
    session: Arc<dyn SessionFacade>,
    windows: Arc<Windows>,
    brightness: Arc<BrightnessController>,
    battery: Option<Arc<BatteryController>>,
    screensaver: Arc<dyn Screensaver>,
    features: FeaturesConfig,
    shared_data_directory: String,
}

impl Greeter {
    /// Connects to the daemon and prepares the accessor.
    ///
    /// A failed connection is reported to the user once a window attaches,
    /// and the greeter keeps running without the daemon.
    pub fn new(
        session: Arc<dyn SessionFacade>,
        windows: Arc<Windows>,
        brightness: Arc<BrightnessController>,
        battery: Option<Arc<BatteryController>>,
        screensaver: Arc<dyn Screensaver>,
        features: FeaturesConfig,
    ) -> Self {
        match session.connect_to_daemon() {
            Ok(()) => info!("Connected to the LightDM daemon"),
            Err(err) => {
                error!("{err:?}");
                windows.prompt(Prompt::notice(
                    "Detected a problem that could interfere with the system login process",
                    &format!(
                        "LightDM: {err}\nYou can continue without major problems, but you won't be able to log in"
                    ),
                ));
            }
        }

        let shared_data_directory = shared_data_directory(session.as_ref());

        if session.lock_hint() {
            screensaver.force();
        }

        Self {
            session,
            windows,
            brightness,
            battery,
            screensaver,
            features,
            shared_data_directory,
        }
    }

    /// Forwards daemon signals and monitor updates to every window.
    pub fn forward_signals(
        &self,
        monitor_events: broadcast::Receiver<MonitorEvent>,
    ) -> [JoinHandle<()>; 2] {
        let windows = self.windows.clone();
        let daemon = self
            .session
            .subscribe()
            .recv_spawn(move |signal: DaemonSignal| {
                windows.emit_signal(signal.name(), signal.args());
            });

        let windows = self.windows.clone();
        let monitors = monitor_events.recv_spawn(move |event: MonitorEvent| {
            windows.emit_signal(event.signal_name(), vec![]);
        });

        [daemon, monitors]
    }

    pub fn shared_data_directory(&self) -> &str {
        &self.shared_data_directory
    }

    fn battery_data(&self) -> Result<Value> {
        let snapshot = self.battery.as_ref().and_then(|battery| battery.snapshot());
        Ok(serde_json::to_value(battery_to_object(snapshot.as_ref()))?)
    }

    fn brightness_set(&self, args: &[Value]) -> Result<Option<Value>> {
        if let Some(value) = arg_i32(args, 0) {
            self.brightness.set_brightness(value);
        }
        Ok(None)
    }

    fn brightness_increase(&self, args: &[Value]) -> Result<Option<Value>> {
        if let Some(value) = arg_i32(args, 0) {
            self.brightness.increase(value);
        }
        Ok(None)
    }

    fn brightness_decrease(&self, args: &[Value]) -> Result<Option<Value>> {
        if let Some(value) = arg_i32(args, 0) {
            self.brightness.decrease(value);
        }
        Ok(None)
    }

    /// Sets the keyboard layout from a layout record or its name.
    fn set_layout(&self, value: &Value) -> Result<()> {
        // the current layout is read first, as the daemon expects
        let current = self.session.layout();
        debug!(
            "Changing layout from {:?}",
            current.map(|layout| layout.name())
        );

        let field = |name: &str| {
            value
                .get(name)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        let layout = match value {
            Value::String(name) => LayoutEntry {
                name: name.clone(),
                ..LayoutEntry::default()
            },
            Value::Object(_) => LayoutEntry {
                name: field("name"),
                short_description: field("short_description"),
                description: field("description"),
            },
            _ => LayoutEntry::default(),
        };

        if layout.name.is_empty() {
            warn!("Ignoring invalid layout {value}");
            return Ok(());
        }

        self.session.set_layout(layout)
    }

    fn set_language(&self, language: &str) -> Result<bool> {
        if self.session.is_authenticated() {
            self.session.set_language(language)
        } else {
            debug!("Not setting language before authentication");
            Ok(false)
        }
    }

    /// Starts `session`, reporting failures to the user instead of the caller.
    fn start_session(&self, session: Option<&str>) -> bool {
        match self.session.start_session(session) {
            Ok(started) => {
                if started || self.session.is_authenticated() {
                    self.screensaver.reset();
                }
                started
            }
            Err(err) => {
                error!("{err:?}");
                self.windows.prompt(Prompt::error(
                    "LightDM couldn't start session",
                    &format!(
                        "The provided session: \"{}\" couldn't be started\n{err}",
                        session.unwrap_or_default()
                    ),
                ));
                false
            }
        }
    }

    /// The members exposed on the `lightdm` channel.
    pub fn registry() -> Registry<Self> {
        Registry::<Self>::new()
            .property("authentication_user", |g| {
                Ok(json!(g.session.authentication_user()))
            })
            .property("autologin_guest", |g| {
                Ok(g.session.autologin_guest_hint().into())
            })
            .property("autologin_timeout", |g| {
                Ok(g.session.autologin_timeout_hint().into())
            })
            .property("autologin_user", |g| Ok(json!(g.session.autologin_user_hint())))
            .property("battery_data", Self::battery_data)
            // deprecated
            .property("batteryData", Self::battery_data)
            .property_rw(
                "brightness",
                |g| Ok(g.brightness.brightness().into()),
                |g, value| {
                    if let Some(value) = value.as_f64() {
                        g.brightness.set_brightness(value.round() as i32);
                    }
                    Ok(())
                },
            )
            .property("can_access_battery", |g| Ok(g.features.battery.into()))
            .property("can_access_brightness", |g| {
                Ok(g.features.backlight.enabled.into())
            })
            .property("can_hibernate", |g| Ok(g.session.can_hibernate().into()))
            .property("can_restart", |g| Ok(g.session.can_restart().into()))
            .property("can_shutdown", |g| Ok(g.session.can_shutdown().into()))
            .property("can_suspend", |g| Ok(g.session.can_suspend().into()))
            .property("default_session", |g| {
                Ok(json!(g.session.default_session_hint()))
            })
            .property("has_guest_account", |g| {
                Ok(g.session.has_guest_account_hint().into())
            })
            .property("hide_users_hint", |g| Ok(g.session.hide_users_hint().into()))
            .property("hostname", |g| Ok(g.session.hostname().into()))
            .property("in_authentication", |g| {
                Ok(g.session.in_authentication().into())
            })
            .property("is_authenticated", |g| Ok(g.session.is_authenticated().into()))
            .property("language", |g| {
                let language = g.session.language();
                Ok(serde_json::to_value(language_to_object(language.as_deref()))?)
            })
            .property("languages", |g| {
                Ok(serde_json::to_value(languages_to_objects(&g.session.languages()))?)
            })
            .property_rw(
                "layout",
                |g| {
                    let layout = g.session.layout();
                    Ok(serde_json::to_value(layout_to_object(layout.as_deref()))?)
                },
                Self::set_layout,
            )
            .property("layouts", |g| {
                Ok(serde_json::to_value(layouts_to_objects(&g.session.layouts()))?)
            })
            .property("lock_hint", |g| Ok(g.session.lock_hint().into()))
            .property("remote_sessions", |g| {
                Ok(serde_json::to_value(sessions_to_objects(&g.session.remote_sessions()))?)
            })
            .property("select_guest_hint", |g| {
                Ok(g.session.select_guest_hint().into())
            })
            .property("select_user_hint", |g| {
                Ok(json!(g.session.select_user_hint()))
            })
            .property("sessions", |g| {
                Ok(serde_json::to_value(sessions_to_objects(&g.session.sessions()))?)
            })
            .property("shared_data_directory", |g| {
                Ok(g.shared_data_directory.as_str().into())
            })
            .property("show_manual_login_hint", |g| {
                Ok(g.session.show_manual_login_hint().into())
            })
            .property("show_remote_login_hint", |g| {
                Ok(g.session.show_remote_login_hint().into())
            })
            .property("users", |g| {
                Ok(serde_json::to_value(users_to_objects(&g.session.users()))?)
            })
            .method("authenticate", |g, args| {
                Ok(Some(g.session.authenticate(arg_str(args, 0))?.into()))
            })
            .method("authenticate_as_guest", |g, _| {
                Ok(Some(g.session.authenticate_as_guest()?.into()))
            })
            .method("brightness_set", Self::brightness_set)
            .method("brightness_increase", Self::brightness_increase)
            .method("brightness_decrease", Self::brightness_decrease)
            // deprecated
            .method("brightnessSet", Self::brightness_set)
            .method("brightnessIncrease", Self::brightness_increase)
            .method("brightnessDecrease", Self::brightness_decrease)
            .method("cancel_authentication", |g, _| {
                Ok(Some(g.session.cancel_authentication()?.into()))
            })
            .method("cancel_autologin", |g, _| {
                Ok(Some(g.session.cancel_autologin()?.into()))
            })
            .method("hibernate", |g, _| Ok(Some(g.session.hibernate()?.into())))
            .method("respond", |g, args| {
                Ok(Some(g.session.respond(arg_str(args, 0).unwrap_or_default())?.into()))
            })
            .method("restart", |g, _| Ok(Some(g.session.restart()?.into())))
            .method("set_language", |g, args| {
                Ok(Some(g.set_language(arg_str(args, 0).unwrap_or_default())?.into()))
            })
            .method("shutdown", |g, _| Ok(Some(g.session.shutdown()?.into())))
            .method("start_session", |g, args| {
                Ok(Some(g.start_session(arg_str(args, 0)).into()))
            })
            .method("suspend", |g, _| Ok(Some(g.session.suspend()?.into())))
    }
}

/// The parent of the first user's shared data directory,
/// or empty if it cannot be determined.
fn shared_data_directory(session: &dyn SessionFacade) -> String {
    let Some(username) = session.users().first().map(|user| user.username()) else {
        return String::new();
    };

    match session.ensure_shared_data_dir(&username) {
        Ok(dir) => Path::new(&dir)
            .parent()
            .map(|parent| parent.to_string_lossy().to_string())
            .unwrap_or_default(),
        Err(err) => {
            debug!("No shared data directory: {err}");
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::screensaver::tests::RecordingScreensaver;
    use crate::config::BacklightConfig;
    use crate::ipc::{Display, Response};
    use crate::lightdm::test_session::{TestSession, TestState};
    use crate::lightdm::UserEntry;
    use crate::{lock, read_lock, write_lock};
    use tokio::sync::mpsc;

    struct Fixture {
        session: Arc<TestSession>,
        windows: Arc<Windows>,
        screensaver: Arc<RecordingScreensaver>,
        greeter: Greeter,
        registry: Registry<Greeter>,
        _backlight: tempfile::TempDir,
    }

    impl Fixture {
        fn call(&self, args: Value) -> Option<Value> {
            self.registry
                .dispatch(&self.greeter, args.as_array().unwrap())
                .unwrap()
        }
    }

    fn fixture(state: TestState) -> Fixture {
        let session = Arc::new(TestSession::new(state));
        let windows = Arc::new(Windows::new());
        let screensaver = Arc::new(RecordingScreensaver::default());

        let backlight = tempfile::tempdir().unwrap();
        let (tx, _) = broadcast::channel(4);
        let brightness = Arc::new(BrightnessController::new(
            backlight.path(),
            &BacklightConfig::default(),
            tx,
        ));

        let greeter = Greeter::new(
            session.clone(),
            windows.clone(),
            brightness,
            None,
            screensaver.clone(),
            FeaturesConfig::default(),
        );

        Fixture {
            session,
            windows,
            screensaver,
            greeter,
            registry: Greeter::registry(),
            _backlight: backlight,
        }
    }

    fn user(name: &str) -> UserEntry {
        UserEntry {
            username: name.to_string(),
            ..UserEntry::default()
        }
    }

    fn attach(windows: &Windows) -> mpsc::UnboundedReceiver<Response> {
        let (tx, rx) = mpsc::unbounded_channel();
        windows.attach(Display::default(), tx);
        rx
    }

    #[test]
    fn connection_failure_prompts_once_attached() {
        let fixture = fixture(TestState {
            connect_error: Some("socket missing".to_string()),
            ..TestState::default()
        });

        let mut rx = attach(&fixture.windows);
        match rx.try_recv().unwrap() {
            Response::Prompt(prompt) => {
                assert_eq!(prompt.buttons, vec!["Okay"]);
                assert!(prompt.detail.starts_with("LightDM: socket missing\n"));
            }
            response => panic!("unexpected response {response:?}"),
        }
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn shared_data_directory_is_parent() {
        let fixture = fixture(TestState {
            users: vec![user("jane"), user("alex")],
            shared_data_dir: Some("/var/lib/lightdm-data/jane".to_string()),
            ..TestState::default()
        });

        assert_eq!(fixture.greeter.shared_data_directory(), "/var/lib/lightdm-data");
        assert!(fixture
            .session
            .calls()
            .contains(&"ensure_shared_data_dir jane".to_string()));
    }

    #[test]
    fn shared_data_directory_without_users() {
        let fixture = fixture(TestState::default());
        assert_eq!(fixture.greeter.shared_data_directory(), "");
        assert_eq!(fixture.call(json!(["shared_data_directory"])), None);
    }

    #[test]
    fn lock_hint_forces_screensaver() {
        let fixture = fixture(TestState {
            lock_hint: true,
            ..TestState::default()
        });

        assert_eq!(*lock!(fixture.screensaver.calls), vec!["force"]);
    }

    #[test]
    fn start_session_failure_prompts() {
        let fixture = fixture(TestState {
            start_session_error: Some("session crashed".to_string()),
            ..TestState::default()
        });
        let mut rx = attach(&fixture.windows);

        assert_eq!(
            fixture.call(json!(["start_session", "gnome"])),
            Some(json!(false))
        );

        match rx.try_recv().unwrap() {
            Response::Prompt(prompt) => {
                assert_eq!(prompt.message, "LightDM couldn't start session");
                assert_eq!(
                    prompt.detail,
                    "The provided session: \"gnome\" couldn't be started\nsession crashed"
                );
                assert_eq!(prompt.buttons.len(), 3);
            }
            response => panic!("unexpected response {response:?}"),
        }
        assert!(rx.try_recv().is_err());
        assert!(lock!(fixture.screensaver.calls).is_empty());
    }

    #[test]
    fn start_session_resets_screensaver() {
        let fixture = fixture(TestState::default());

        assert_eq!(
            fixture.call(json!(["start_session", "xfce"])),
            Some(json!(true))
        );
        assert_eq!(*lock!(fixture.screensaver.calls), vec!["reset"]);
    }

    #[test]
    fn set_language_requires_authentication() {
        let fixture = fixture(TestState::default());

        assert_eq!(
            fixture.call(json!(["set_language", "de_DE.utf8"])),
            Some(json!(false))
        );
        assert!(!fixture
            .session
            .calls()
            .iter()
            .any(|call| call.starts_with("set_language")));

        write_lock!(fixture.session.state).authenticated = true;
        assert_eq!(
            fixture.call(json!(["set_language", "de_DE.utf8"])),
            Some(json!(true))
        );
        assert!(fixture
            .session
            .calls()
            .contains(&"set_language de_DE.utf8".to_string()));
    }

    #[test]
    fn layout_setter_reads_first() {
        let us = LayoutEntry {
            name: "us".to_string(),
            short_description: "en".to_string(),
            description: "English (US)".to_string(),
        };
        let fixture = fixture(TestState {
            layouts: vec![us],
            ..TestState::default()
        });

        let value = json!({"name": "us", "short_description": "en", "description": "English (US)"});
        assert_eq!(fixture.call(json!(["layout", value.clone()])), None);

        let calls = fixture.session.calls();
        let tail = &calls[calls.len() - 2..];
        assert_eq!(tail, ["layout", "set_layout us"]);

        assert_eq!(fixture.call(json!(["layout"])), Some(value));
    }

    #[test]
    fn layout_setter_forwards_every_field() {
        let fixture = fixture(TestState::default());

        let value = json!({
            "name": "de\tnodeadkeys",
            "short_description": "de",
            "description": "German (no dead keys)"
        });
        fixture.call(json!(["layout", value.clone()]));
        assert_eq!(
            read_lock!(fixture.session.state).layout,
            Some(LayoutEntry {
                name: "de\tnodeadkeys".to_string(),
                short_description: "de".to_string(),
                description: "German (no dead keys)".to_string(),
            })
        );
        assert_eq!(fixture.call(json!(["layout"])), Some(value));

        fixture.call(json!(["layout", {"description": "nameless"}]));
        assert_eq!(
            fixture.call(json!(["layout"])).unwrap()["name"],
            "de\tnodeadkeys"
        );
    }

    #[test]
    fn falsy_and_unknown_members_are_absent() {
        let fixture = fixture(TestState::default());

        assert_eq!(fixture.call(json!(["hide_users_hint"])), None);
        assert_eq!(fixture.call(json!(["autologin_timeout"])), None);
        assert_eq!(fixture.call(json!(["not_a_member"])), None);
        assert_eq!(
            fixture.call(json!(["show_manual_login_hint"])),
            Some(json!(true))
        );
        assert_eq!(
            fixture.call(json!(["default_session"])),
            Some(json!("xfce"))
        );
    }

    #[test]
    fn disabled_brightness_is_inert() {
        let fixture = fixture(TestState::default());

        assert_eq!(fixture.call(json!(["brightness"])), Some(json!(-1)));
        assert_eq!(fixture.call(json!(["brightness_set", 50])), None);
        assert_eq!(fixture.call(json!(["brightnessIncrease", 10])), None);
        assert_eq!(fixture.call(json!(["brightness"])), Some(json!(-1)));
        assert_eq!(fixture.call(json!(["can_access_brightness"])), None);
    }

    #[test]
    fn no_battery_data() {
        let fixture = fixture(TestState::default());

        assert_eq!(fixture.call(json!(["battery_data"])), None);
        assert_eq!(fixture.call(json!(["batteryData"])), None);
        assert_eq!(fixture.call(json!(["can_access_battery"])), None);
    }

    #[test]
    fn collections_are_normalized() {
        let fixture = fixture(TestState {
            users: vec![user("jane")],
            ..TestState::default()
        });

        let users = fixture.call(json!(["users"])).unwrap();
        assert_eq!(users[0]["username"], "jane");
        assert_eq!(users[0]["logged_in"], false);

        assert_eq!(fixture.call(json!(["sessions"])), Some(json!([])));
    }

    #[test]
    fn methods_forward_to_session() {
        let fixture = fixture(TestState::default());

        assert_eq!(
            fixture.call(json!(["authenticate", "jane"])),
            Some(json!(true))
        );
        assert_eq!(fixture.call(json!(["in_authentication"])), Some(json!(true)));
        assert_eq!(fixture.call(json!(["respond", "hunter2"])), Some(json!(true)));
        assert_eq!(fixture.call(json!(["hibernate"])), Some(json!(false)));

        let calls = fixture.session.calls();
        assert!(calls.contains(&"authenticate jane".to_string()));
        assert!(calls.contains(&"respond hunter2".to_string()));
    }

    #[tokio::test]
    async fn daemon_signals_reach_every_window_once() {
        let fixture = fixture(TestState::default());
        let mut rx_a = attach(&fixture.windows);
        let mut rx_b = attach(&fixture.windows);

        let (_monitor_tx, monitor_rx) = broadcast::channel(4);
        let _handles = fixture.greeter.forward_signals(monitor_rx);

        fixture.session.signals.send(DaemonSignal::Idle).unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let idle = Response::Signal {
            name: "idle".to_string(),
            args: vec![],
        };
        for rx in [&mut rx_a, &mut rx_b] {
            assert_eq!(rx.try_recv().unwrap(), idle);
            assert!(rx.try_recv().is_err());
        }
    }

    #[tokio::test]
    async fn monitor_events_are_forwarded() {
        let fixture = fixture(TestState::default());
        let mut rx = attach(&fixture.windows);

        let (monitor_tx, monitor_rx) = broadcast::channel(4);
        let _handles = fixture.greeter.forward_signals(monitor_rx);

        monitor_tx.send(MonitorEvent::BatteryUpdate).unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        assert_eq!(
            rx.try_recv().unwrap(),
            Response::Signal {
                name: "battery_update".to_string(),
                args: vec![],
            }
        );
    }
}
