use chrono::Duration;

/// Format a countdown as `m:ss`, or `h:mm:ss` once hours are involved.
/// Anything non-positive renders as `0:00`.
pub fn format_time_remaining(remaining: Duration) -> String {
    let total_seconds = remaining.num_seconds().max(0);
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

/// Spell out a lockout countdown for the login form, e.g.
/// "14 minutes and 3 seconds".
pub fn format_lockout_remaining(remaining: Duration) -> String {
    let total_seconds = remaining.num_seconds().max(0);
    if total_seconds == 0 {
        return "0 seconds".to_string();
    }

    let minutes = total_seconds / 60;
    let seconds = total_seconds % 60;
    let plural = |n: i64| if n == 1 { "" } else { "s" };

    if minutes > 0 {
        format!(
            "{} minute{} and {} second{}",
            minutes,
            plural(minutes),
            seconds,
            plural(seconds)
        )
    } else {
        format!("{} second{}", seconds, plural(seconds))
    }
}
