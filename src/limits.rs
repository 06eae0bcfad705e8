//! Hard limits on input sizes and counts. Everything the network can make the
//! server allocate is bounded here.

/// Max bookings held by one store.
pub const MAX_BOOKINGS: usize = 10_000;

/// Max length of a booking title, in bytes.
pub const MAX_TITLE_LEN: usize = 200;

/// Max length of a member display name, in bytes.
pub const MAX_MEMBER_LEN: usize = 100;

/// Max length of booking notes, in bytes.
pub const MAX_NOTES_LEN: usize = 4_000;

/// Longest single stay, in calendar days (inclusive).
pub const MAX_STAY_DAYS: i64 = 366;

/// Earliest year a booking may touch.
pub const MIN_VALID_YEAR: i32 = 2000;

/// Latest year a booking may touch.
pub const MAX_VALID_YEAR: i32 = 2200;

/// Max live sessions before new logins are refused.
pub const MAX_SESSIONS: usize = 4_096;

/// Max length of the shared password accepted on login.
pub const MAX_PASSWORD_LEN: usize = 1_024;

/// Max length of one protocol line, in bytes.
pub const MAX_LINE_LEN: usize = 64 * 1024;
