//! Timestamped, source-located log lines with optional ANSI colour.
//!
//! Every line produced by [`tlog!`] has the shape:
//!
//! ```text
//! 20261015T09:14:02.311 - src/chat.rs:88 - chat: u-Zq81mBc marked 3 message(s) read
//! ```
//!
//! Output goes to stderr unless [`set_writer`] installs another destination
//! (tests capture lines this way).  Colour is only used when stderr is a
//! terminal and no custom writer is installed.

use std::io::{self, IsTerminal, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{LazyLock, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

static COLOUR_ENABLED: AtomicBool = AtomicBool::new(false);

static LOG_WRITER: LazyLock<Mutex<Box<dyn Write + Send>>> =
    LazyLock::new(|| Mutex::new(Box::new(io::stderr())));

/// Detect terminal support. Call once at startup.
pub fn init() {
    COLOUR_ENABLED.store(io::stderr().is_terminal(), Ordering::Relaxed);
}

/// Redirect all subsequent log output to `w` and turn colour off.
pub fn set_writer(w: Box<dyn Write + Send>) {
    COLOUR_ENABLED.store(false, Ordering::Relaxed);
    if let Ok(mut guard) = LOG_WRITER.lock() {
        *guard = w;
    }
}

pub fn colour_enabled() -> bool {
    COLOUR_ENABLED.load(Ordering::Relaxed)
}

const RESET: &str = "\x1b[0m";
const DIM: &str = "\x1b[2m";
const ITEM_COLOUR: &str = "\x1b[93m";

const ID_COLOURS: &[&str] = &[
    "\x1b[91m", "\x1b[92m", "\x1b[94m", "\x1b[95m", "\x1b[96m", "\x1b[32m", "\x1b[34m", "\x1b[35m",
    "\x1b[36m",
];

const SHORT_ID_LEN: usize = 7;

fn shorten(id: &str) -> &str {
    match id.char_indices().nth(SHORT_ID_LEN) {
        Some((i, _)) => &id[..i],
        None => id,
    }
}

fn colour_for(id: &str) -> &'static str {
    let hash = id
        .bytes()
        .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(u32::from(b)));
    ID_COLOURS[hash as usize % ID_COLOURS.len()]
}

/// Render a user id as `u-XXXXXXX`, coloured consistently per user.
pub fn user_id(id: &str) -> String {
    let short = shorten(id);
    if colour_enabled() {
        format!("{}u-{short}{RESET}", colour_for(id))
    } else {
        format!("u-{short}")
    }
}

/// Render a post, comment or chat message id as `i-XXXXXXX`.
pub fn item_id(id: &str) -> String {
    let short = shorten(id);
    if colour_enabled() {
        format!("{ITEM_COLOUR}i-{short}{RESET}")
    } else {
        format!("i-{short}")
    }
}

/// Wall-clock time as `YYYYMMDDTHH:MM:SS.mmm` (UTC).
pub fn format_timestamp() -> String {
    let since_epoch = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format_epoch_millis(since_epoch.as_millis() as u64)
}

/// Format a millisecond UNIX timestamp in the log timestamp layout.
pub fn format_epoch_millis(millis: u64) -> String {
    let secs = millis / 1000;
    let (y, m, d) = civil_from_days((secs / 86_400) as i64);
    let day_secs = secs % 86_400;
    format!(
        "{y:04}{m:02}{d:02}T{:02}:{:02}:{:02}.{:03}",
        day_secs / 3600,
        (day_secs % 3600) / 60,
        day_secs % 60,
        millis % 1000
    )
}

// Proleptic Gregorian date for a day count since 1970-01-01.
fn civil_from_days(days: i64) -> (i64, u64, u64) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097) as u64;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = yoe as i64 + era * 400 + i64::from(month <= 2);
    (year, month, day)
}

/// Write one formatted line. Used by [`tlog!`].
pub fn emit(file: &str, line: u32, msg: &str) {
    let ts = format_timestamp();
    let formatted = if colour_enabled() {
        format!("{DIM}{ts} {file}:{line}{RESET} {msg}")
    } else {
        format!("{ts} - {file}:{line} - {msg}")
    };
    if let Ok(mut writer) = LOG_WRITER.lock() {
        let _ = writeln!(writer, "{formatted}");
    }
}

/// Log a line with timestamp and call site.
///
/// ```ignore
/// tlog!("feed: {} posted {}", logging::user_id(&uid), logging::item_id(&post_id));
/// ```
#[macro_export]
macro_rules! tlog {
    ($($arg:tt)*) => {{
        $crate::logging::emit(file!(), line!(), &format!($($arg)*));
    }};
}
