#[repr(i32)]
pub enum ExitCode {
    ConfigError = 1,
    IpcServer = 2,
    IpcResponseError = 3,
    CliError = 4,
}

pub const ERR_MUTEX_LOCK: &str = "Failed to get lock on Mutex";
pub const ERR_READ_LOCK: &str = "Failed to get read lock";
pub const ERR_WRITE_LOCK: &str = "Failed to get write lock";
pub const ERR_NOT_CONNECTED: &str = "Not connected to the LightDM daemon";
