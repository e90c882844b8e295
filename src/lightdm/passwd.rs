use super::UserEntry;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

const MIN_UID: u32 = 1000;
const MAX_UID: u32 = 60000;

const HIDDEN_SHELLS: [&str; 3] = ["/bin/false", "/usr/sbin/nologin", "/sbin/nologin"];

/// A single line of `/etc/passwd`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PasswdEntry {
    username: String,
    uid: u32,
    gecos: String,
    home: String,
    shell: String,
}

impl PasswdEntry {
    fn parse(line: &str) -> Option<Self> {
        let mut fields = line.split(':');

        let username = fields.next()?.to_string();
        let _password = fields.next()?;
        let uid = fields.next()?.parse().ok()?;
        let _gid = fields.next()?;
        let gecos = fields.next()?.to_string();
        let home = fields.next()?.to_string();
        let shell = fields.next().unwrap_or_default().to_string();

        Some(Self {
            username,
            uid,
            gecos,
            home,
            shell,
        })
    }

    /// Whether this is a human login account.
    fn is_login_user(&self) -> bool {
        (MIN_UID..=MAX_UID).contains(&self.uid) && !HIDDEN_SHELLS.contains(&self.shell.as_str())
    }

    /// The first comma-separated GECOS field,
    /// or the username if it is empty.
    fn display_name(&self) -> String {
        self.gecos
            .split(',')
            .next()
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.username)
            .to_string()
    }
}

/// Per-user settings stored by AccountsService.
#[derive(Debug, Default, PartialEq, Eq)]
struct AccountSettings {
    session: Option<String>,
    language: Option<String>,
    icon: Option<String>,
    background: Option<String>,
}

impl AccountSettings {
    fn parse(contents: &str) -> Self {
        let mut settings = Self::default();
        let mut in_user_section = false;

        for line in contents.lines().map(str::trim) {
            if line.starts_with('[') {
                in_user_section = line == "[User]";
                continue;
            }

            if !in_user_section {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                continue;
            };

            let value = Some(value.trim().to_string()).filter(|value| !value.is_empty());

            match key.trim() {
                "Session" => settings.session = value.or(settings.session.take()),
                "XSession" if settings.session.is_none() => settings.session = value,
                "Language" => settings.language = value,
                "Icon" => settings.icon = value,
                "BackgroundFile" => settings.background = value,
                _ => {}
            }
        }

        settings
    }
}

/// Reads the login users from the passwd file,
/// enriching them with AccountsService settings where present.
pub fn load_users(passwd: &Path, accounts_dir: &Path, runtime_dir: &Path) -> Vec<UserEntry> {
    let contents = match fs::read_to_string(passwd) {
        Ok(contents) => contents,
        Err(err) => {
            warn!("Failed to read {}: {err}", passwd.display());
            return vec![];
        }
    };

    let mut users = contents
        .lines()
        .filter_map(PasswdEntry::parse)
        .filter(PasswdEntry::is_login_user)
        .map(|entry| {
            let settings = fs::read_to_string(accounts_dir.join(&entry.username))
                .map(|contents| AccountSettings::parse(&contents))
                .unwrap_or_default();

            let face = Path::new(&entry.home).join(".face");
            let image = settings.icon.unwrap_or_else(|| {
                if face.is_file() {
                    face.to_string_lossy().to_string()
                } else {
                    String::new()
                }
            });

            UserEntry {
                background: settings.background.unwrap_or_default(),
                display_name: entry.display_name(),
                home_directory: entry.home.clone(),
                image,
                language: settings.language.unwrap_or_default(),
                layout: String::new(),
                layouts: vec![],
                logged_in: runtime_dir.join(entry.uid.to_string()).is_dir(),
                session: settings.session.unwrap_or_default(),
                username: entry.username,
            }
        })
        .collect::<Vec<_>>();

    users.sort_by(|a, b| a.username.cmp(&b.username));
    debug!("Found {} users", users.len());

    users
}
