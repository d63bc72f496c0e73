use chrono::{ DateTime, Local, NaiveDateTime, Utc };

/// Message footer timestamp: same day shows the time only, yesterday gets
/// an explicit marker, anything older gets the full date.
pub fn format_timestamp(ts: NaiveDateTime, now: NaiveDateTime) -> String {
    let date = ts.date();
    let today = now.date();
    if date == today {
        ts.format("%H:%M").to_string()
    } else if today.pred_opt() == Some(date) {
        format!("Yesterday {}", ts.format("%H:%M"))
    } else {
        ts.format("%b %-d, %Y %H:%M").to_string()
    }
}

/// Format a stored UTC timestamp against the local wall clock.
pub fn local_timestamp(ts: DateTime<Utc>) -> String {
    format_timestamp(
        ts.with_timezone(&Local).naive_local(),
        Local::now().naive_local()
    )
}
