use zbus::proxy;

#[proxy(
    interface = "org.freedesktop.login1.Manager",
    default_service = "org.freedesktop.login1",
    default_path = "/org/freedesktop/login1"
)]
pub trait Manager {
    /// Returns `yes`, `no`, `challenge` or `na`.
    fn can_power_off(&self) -> zbus::Result<String>;
    fn can_reboot(&self) -> zbus::Result<String>;
    fn can_suspend(&self) -> zbus::Result<String>;
    fn can_hibernate(&self) -> zbus::Result<String>;

    fn power_off(&self, interactive: bool) -> zbus::Result<()>;
    fn reboot(&self, interactive: bool) -> zbus::Result<()>;
    fn suspend(&self, interactive: bool) -> zbus::Result<()>;
    fn hibernate(&self, interactive: bool) -> zbus::Result<()>;
}

/// Whether a `Can*` answer permits the action.
/// `challenge` means the caller would need to authenticate first,
/// which the greeter cannot do.
pub fn is_allowed(answer: &str) -> bool {
    answer == "yes"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_yes_is_allowed() {
        assert!(is_allowed("yes"));
        assert!(!is_allowed("challenge"));
        assert!(!is_allowed("no"));
        assert!(!is_allowed("na"));
    }
}
