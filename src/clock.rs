extern crate chrono;
extern crate chrono_tz;

// Anything before this means the system clock was never synced.
const FIRST_PLAUSIBLE_TIMESTAMP: i64 = 1577836800; // 2020-01-01T00:00:00Z

pub fn current_time(tz: &chrono_tz::Tz, with_seconds: bool) -> String {
    return format_time(&chrono::Utc::now(), tz, with_seconds);
}

pub fn format_time(now: &chrono::DateTime<chrono::Utc>, tz: &chrono_tz::Tz, with_seconds: bool) -> String {
    if now.timestamp() < FIRST_PLAUSIBLE_TIMESTAMP {
        return if with_seconds { "--:--:--" } else { "--:--" }.to_string();
    }

    let local = now.with_timezone(tz);
    return local.format(if with_seconds { "%H:%M:%S" } else { "%H:%M" }).to_string();
}
