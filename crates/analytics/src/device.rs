//! Device details attached to every event.

use journal_core::DeviceInfo;

/// Captures platform, user agent, locale and timezone from the host
/// environment.
pub fn capture_device_info(user_agent: Option<&str>, screen_size: Option<&str>) -> DeviceInfo {
    DeviceInfo {
        platform: format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH),
        user_agent: user_agent
            .map(str::to_string)
            .unwrap_or_else(|| format!("sipjournal/{}", env!("CARGO_PKG_VERSION"))),
        screen_size: screen_size.map(str::to_string),
        locale: detect_locale(),
        timezone: detect_timezone(),
    }
}

/// POSIX locale variables, normalised from "en_US.UTF-8" to "en-US".
fn detect_locale() -> String {
    ["LC_ALL", "LC_MESSAGES", "LANG"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|v| !v.is_empty() && v != "C" && v != "POSIX")
        .map(|v| normalize_locale(&v))
        .unwrap_or_else(|| "en-US".to_string())
}

fn normalize_locale(raw: &str) -> String {
    raw.split(['.', '@'])
        .next()
        .unwrap_or(raw)
        .replace('_', "-")
}

/// `TZ` when set, otherwise the current UTC offset.
fn detect_timezone() -> String {
    match std::env::var("TZ") {
        Ok(tz) if !tz.is_empty() => tz.trim_start_matches(':').to_string(),
        _ => chrono::Local::now().offset().to_string(),
    }
}
