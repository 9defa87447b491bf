//! RFC 959 reply codes used by the client.

pub const FILE_STATUS_OK: u16 = 150;

pub const COMMAND_OK: u16 = 200;
pub const SYSTEM_STATUS: u16 = 211;
pub const DIRECTORY_STATUS: u16 = 212;
pub const FILE_STATUS: u16 = 213;
pub const SYSTEM_TYPE: u16 = 215;
pub const SERVICE_READY: u16 = 220;
pub const CLOSING_CONTROL_CONNECTION: u16 = 221;
pub const CLOSING_DATA_CONNECTION: u16 = 226;
pub const ENTERING_PASSIVE_MODE: u16 = 227;
pub const USER_LOGGED_IN: u16 = 230;
pub const AUTH_MECHANISM_ACCEPTED: u16 = 234;
pub const FILE_ACTION_OK: u16 = 250;
pub const PATHNAME_CREATED: u16 = 257;

pub const NEED_PASSWORD: u16 = 331;
pub const FILE_ACTION_PENDING: u16 = 350;

pub const FILE_ACTION_NOT_TAKEN: u16 = 450;
pub const FILE_UNAVAILABLE: u16 = 550;

/// Codes that signal a permission/availability problem on one path
/// rather than a broken session.
pub fn is_skippable(code: u16) -> bool {
    matches!(code, FILE_ACTION_NOT_TAKEN | FILE_UNAVAILABLE)
}

