//! Plain serializable records built from the facade's handles.

use crate::clients::battery::BatteryState;
use crate::lightdm::{NativeLanguage, NativeLayout, NativeSession, NativeUser};
use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct User {
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

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Session {
    pub comment: String,
    pub key: String,
    pub name: String,
    #[serde(rename = "type")]
    pub session_type: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Language {
    pub code: String,
    pub name: String,
    pub territory: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Layout {
    pub description: String,
    pub name: String,
    pub short_description: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Battery {
    pub name: String,
    pub level: i32,
    pub status: String,
    pub ac_status: bool,
    pub capacity: u32,
    pub time: String,
    pub watt: f64,
}

pub fn user_to_object(user: Option<&dyn NativeUser>) -> Option<User> {
    let user = user?;

    Some(User {
        background: user.background(),
        display_name: user.display_name(),
        home_directory: user.home_directory(),
        image: user.image(),
        language: user.language(),
        layout: user.layout(),
        layouts: user.layouts(),
        logged_in: user.logged_in(),
        session: user.session(),
        username: user.username(),
    })
}

pub fn session_to_object(session: Option<&dyn NativeSession>) -> Option<Session> {
    let session = session?;

    Some(Session {
        comment: session.comment(),
        key: session.key(),
        name: session.name(),
        session_type: session.session_type(),
    })
}

pub fn language_to_object(language: Option<&dyn NativeLanguage>) -> Option<Language> {
    let language = language?;

    Some(Language {
        code: language.code(),
        name: language.name(),
        territory: language.territory(),
    })
}

pub fn layout_to_object(layout: Option<&dyn NativeLayout>) -> Option<Layout> {
    let layout = layout?;

    Some(Layout {
        description: layout.description(),
        name: layout.name(),
        short_description: layout.short_description(),
    })
}

/// `None` when the machine has no battery.
pub fn battery_to_object(battery: Option<&BatteryState>) -> Option<Battery> {
    let battery = battery?;

    Some(Battery {
        name: battery.name.clone(),
        level: battery.level,
        status: battery.status.clone(),
        ac_status: battery.ac_status,
        capacity: battery.capacity,
        time: battery.time.clone(),
        watt: battery.watt,
    })
}

pub fn users_to_objects(users: &[Box<dyn NativeUser>]) -> Vec<User> {
    users
        .iter()
        .filter_map(|user| user_to_object(Some(user.as_ref())))
        .collect()
}

pub fn sessions_to_objects(sessions: &[Box<dyn NativeSession>]) -> Vec<Session> {
    sessions
        .iter()
        .filter_map(|session| session_to_object(Some(session.as_ref())))
        .collect()
}

pub fn languages_to_objects(languages: &[Box<dyn NativeLanguage>]) -> Vec<Language> {
    languages
        .iter()
        .filter_map(|language| language_to_object(Some(language.as_ref())))
        .collect()
}

pub fn layouts_to_objects(layouts: &[Box<dyn NativeLayout>]) -> Vec<Layout> {
    layouts
        .iter()
        .filter_map(|layout| layout_to_object(Some(layout.as_ref())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lightdm::{SessionEntry, UserEntry};
    use serde_json::json;

    #[test]
    fn absent_handles_are_absent() {
        assert!(user_to_object(None).is_none());
        assert!(session_to_object(None).is_none());
        assert!(language_to_object(None).is_none());
        assert!(layout_to_object(None).is_none());
        assert!(battery_to_object(None).is_none());
    }

    #[test]
    fn user_record() {
        let entry = UserEntry {
            display_name: "Jane Doe".to_string(),
            home_directory: "/home/jane".to_string(),
            logged_in: true,
            username: "jane".to_string(),
            layouts: vec!["us".to_string()],
            ..UserEntry::default()
        };

        let user = user_to_object(Some(&entry)).unwrap();
        assert_eq!(
            serde_json::to_value(user).unwrap(),
            json!({
                "background": "",
                "display_name": "Jane Doe",
                "home_directory": "/home/jane",
                "image": "",
                "language": "",
                "layout": "",
                "layouts": ["us"],
                "logged_in": true,
                "session": "",
                "username": "jane",
            })
        );
    }

    #[test]
    fn session_type_is_renamed() {
        let entry = SessionEntry {
            key: "sway".to_string(),
            name: "Sway".to_string(),
            comment: String::new(),
            session_type: "wayland".to_string(),
        };

        let value = serde_json::to_value(session_to_object(Some(&entry))).unwrap();
        assert_eq!(value["type"], "wayland");
        assert_eq!(value["key"], "sway");
    }

    #[test]
    fn battery_record() {
        let state = BatteryState {
            name: "BAT0".to_string(),
            level: 85,
            status: "Discharging".to_string(),
            ac_status: false,
            capacity: 92,
            time: "03:10".to_string(),
            watt: 7.5,
        };

        let battery = battery_to_object(Some(&state)).unwrap();
        assert_eq!(battery.level, 85);
        assert_eq!(serde_json::to_value(battery).unwrap()["ac_status"], false);
    }

    #[test]
    fn arrays_keep_order() {
        let sessions: Vec<Box<dyn NativeSession>> = vec![
            Box::new(SessionEntry {
                key: "b".to_string(),
                ..SessionEntry::default()
            }),
            Box::new(SessionEntry {
                key: "a".to_string(),
                ..SessionEntry::default()
            }),
        ];

        let keys = sessions_to_objects(&sessions)
            .into_iter()
            .map(|session| session.key)
            .collect::<Vec<_>>();
        assert_eq!(keys, vec!["b", "a"]);
    }
}
