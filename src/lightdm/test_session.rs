use super::{
    DaemonSignal, LanguageEntry, LayoutEntry, NativeLanguage, NativeLayout, NativeSession,
    NativeUser, SessionEntry, SessionFacade, UserEntry,
};
use crate::{lock, read_lock, write_lock};
use color_eyre::{Report, Result};
use std::sync::{Mutex, RwLock};
use tokio::sync::broadcast;

/// In-memory session facade which records every call made to it.
pub struct TestSession {
    pub state: RwLock<TestState>,
    pub calls: Mutex<Vec<String>>,
    pub signals: broadcast::Sender<DaemonSignal>,
}

#[derive(Debug, Clone, Default)]
pub struct TestState {
    pub connect_error: Option<String>,
    pub start_session_error: Option<String>,
    pub shared_data_dir: Option<String>,
    pub authenticated: bool,
    pub in_authentication: bool,
    pub authentication_user: Option<String>,
    pub autologin_timeout: i32,
    pub lock_hint: bool,
    pub hide_users: bool,
    pub hostname: String,
    pub can_suspend: bool,
    pub users: Vec<UserEntry>,
    pub sessions: Vec<SessionEntry>,
    pub languages: Vec<LanguageEntry>,
    pub language: Option<LanguageEntry>,
    pub layouts: Vec<LayoutEntry>,
    pub layout: Option<LayoutEntry>,
}

impl TestSession {
    pub fn new(state: TestState) -> Self {
        let (signals, _) = broadcast::channel(16);

        Self {
            state: RwLock::new(state),
            calls: Mutex::new(vec![]),
            signals,
        }
    }

    pub fn calls(&self) -> Vec<String> {
        lock!(self.calls).clone()
    }

    fn record(&self, call: impl Into<String>) {
        lock!(self.calls).push(call.into());
    }
}

impl Default for TestSession {
    fn default() -> Self {
        Self::new(TestState::default())
    }
}

impl SessionFacade for TestSession {
    fn connect_to_daemon(&self) -> Result<()> {
        self.record("connect_to_daemon");
        match &read_lock!(self.state).connect_error {
            Some(err) => Err(Report::msg(err.clone())),
            None => Ok(()),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<DaemonSignal> {
        self.signals.subscribe()
    }

    fn authenticate(&self, username: Option<&str>) -> Result<bool> {
        self.record(format!("authenticate {}", username.unwrap_or("null")));
        write_lock!(self.state).in_authentication = true;
        Ok(true)
    }

    fn authenticate_as_guest(&self) -> Result<bool> {
        self.record("authenticate_as_guest");
        Ok(true)
    }

    fn cancel_authentication(&self) -> Result<bool> {
        self.record("cancel_authentication");
        write_lock!(self.state).in_authentication = false;
        Ok(true)
    }

    fn cancel_autologin(&self) -> Result<bool> {
        self.record("cancel_autologin");
        Ok(true)
    }

    fn respond(&self, response: &str) -> Result<bool> {
        self.record(format!("respond {response}"));
        Ok(true)
    }

    fn start_session(&self, session: Option<&str>) -> Result<bool> {
        self.record(format!("start_session {}", session.unwrap_or("null")));
        match &read_lock!(self.state).start_session_error {
            Some(err) => Err(Report::msg(err.clone())),
            None => Ok(true),
        }
    }

    fn set_language(&self, language: &str) -> Result<bool> {
        self.record(format!("set_language {language}"));
        Ok(true)
    }

    fn ensure_shared_data_dir(&self, username: &str) -> Result<String> {
        self.record(format!("ensure_shared_data_dir {username}"));
        read_lock!(self.state)
            .shared_data_dir
            .clone()
            .ok_or_else(|| Report::msg("no shared data dir"))
    }

    fn authentication_user(&self) -> Option<String> {
        read_lock!(self.state).authentication_user.clone()
    }

    fn in_authentication(&self) -> bool {
        read_lock!(self.state).in_authentication
    }

    fn is_authenticated(&self) -> bool {
        read_lock!(self.state).authenticated
    }

    fn autologin_guest_hint(&self) -> bool {
        false
    }

    fn autologin_timeout_hint(&self) -> i32 {
        read_lock!(self.state).autologin_timeout
    }

    fn autologin_user_hint(&self) -> Option<String> {
        None
    }

    fn default_session_hint(&self) -> Option<String> {
        Some("xfce".to_string())
    }

    fn has_guest_account_hint(&self) -> bool {
        false
    }

    fn hide_users_hint(&self) -> bool {
        read_lock!(self.state).hide_users
    }

    fn lock_hint(&self) -> bool {
        read_lock!(self.state).lock_hint
    }

    fn select_guest_hint(&self) -> bool {
        false
    }

    fn select_user_hint(&self) -> Option<String> {
        None
    }

    fn show_manual_login_hint(&self) -> bool {
        true
    }

    fn show_remote_login_hint(&self) -> bool {
        false
    }

    fn users(&self) -> Vec<Box<dyn NativeUser>> {
        read_lock!(self.state)
            .users
            .iter()
            .cloned()
            .map(|user| Box::new(user) as Box<dyn NativeUser>)
            .collect()
    }

    fn hostname(&self) -> String {
        read_lock!(self.state).hostname.clone()
    }

    fn can_hibernate(&self) -> bool {
        false
    }

    fn can_restart(&self) -> bool {
        true
    }

    fn can_shutdown(&self) -> bool {
        true
    }

    fn can_suspend(&self) -> bool {
        read_lock!(self.state).can_suspend
    }

    fn hibernate(&self) -> Result<bool> {
        self.record("hibernate");
        Ok(false)
    }

    fn restart(&self) -> Result<bool> {
        self.record("restart");
        Ok(true)
    }

    fn shutdown(&self) -> Result<bool> {
        self.record("shutdown");
        Ok(true)
    }

    fn suspend(&self) -> Result<bool> {
        self.record("suspend");
        Ok(true)
    }

    fn language(&self) -> Option<Box<dyn NativeLanguage>> {
        read_lock!(self.state)
            .language
            .clone()
            .map(|language| Box::new(language) as Box<dyn NativeLanguage>)
    }

    fn languages(&self) -> Vec<Box<dyn NativeLanguage>> {
        read_lock!(self.state)
            .languages
            .iter()
            .cloned()
            .map(|language| Box::new(language) as Box<dyn NativeLanguage>)
            .collect()
    }

    fn layout(&self) -> Option<Box<dyn NativeLayout>> {
        self.record("layout");
        read_lock!(self.state)
            .layout
            .clone()
            .map(|layout| Box::new(layout) as Box<dyn NativeLayout>)
    }

    fn layouts(&self) -> Vec<Box<dyn NativeLayout>> {
        read_lock!(self.state)
            .layouts
            .iter()
            .cloned()
            .map(|layout| Box::new(layout) as Box<dyn NativeLayout>)
            .collect()
    }

    fn set_layout(&self, layout: LayoutEntry) -> Result<()> {
        self.record(format!("set_layout {}", layout.name));
        write_lock!(self.state).layout = Some(layout);
        Ok(())
    }

    fn sessions(&self) -> Vec<Box<dyn NativeSession>> {
        read_lock!(self.state)
            .sessions
            .iter()
            .cloned()
            .map(|session| Box::new(session) as Box<dyn NativeSession>)
            .collect()
    }

    fn remote_sessions(&self) -> Vec<Box<dyn NativeSession>> {
        vec![]
    }
}
