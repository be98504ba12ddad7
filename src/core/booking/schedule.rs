//! Appointment start timestamps built from spoken date and time slots.

use once_cell::sync::Lazy;
use regex::Regex;
use time::macros::format_description;
use time::{Date, PrimitiveDateTime, Time};

static CLOCK_TIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(\d{1,2})(?::(\d{2}))?(?::\d{2})?\s*(a\.?m\.?|p\.?m\.?)?\s*$")
        .expect("clock time pattern is valid")
});

fn parse_date(date: &str) -> Option<Date> {
    Date::parse(date.trim(), format_description!("[year]-[month]-[day]")).ok()
}

/// Accepts `HH:MM`, `HH:MM:SS`, `H:MM am/pm` and `H am/pm`.
pub fn parse_clock_time(value: &str) -> Option<Time> {
    let caps = CLOCK_TIME.captures(value)?;
    let mut hour: u8 = caps.get(1)?.as_str().parse().ok()?;
    let minute: u8 = match caps.get(2) {
        Some(m) => m.as_str().parse().ok()?,
        None => 0,
    };

    if let Some(meridiem) = caps.get(3) {
        if !(1..=12).contains(&hour) {
            return None;
        }
        let pm = meridiem.as_str().to_ascii_lowercase().starts_with('p');
        hour = match (pm, hour) {
            (false, 12) => 0,
            (true, 12) => 12,
            (true, h) => h + 12,
            (false, h) => h,
        };
    } else if caps.get(2).is_none() {
        // A bare number is too ambiguous to be a clock time
        return None;
    }

    Time::from_hms(hour, minute, 0).ok()
}

/// `YYYY-MM-DDTHH:MM:SS` when both slots parse, otherwise `"{date}T{time}"`.
pub fn appointment_start(date: &str, time: &str) -> String {
    match (parse_date(date), parse_clock_time(time)) {
        (Some(d), Some(t)) => {
            let start = PrimitiveDateTime::new(d, t);
            start
                .format(format_description!(
                    "[year]-[month]-[day]T[hour]:[minute]:[second]"
                ))
                .unwrap_or_else(|_| format!("{}T{}", date.trim(), time.trim()))
        }
        _ => format!("{}T{}", date.trim(), time.trim()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_twenty_four_hour_time() {
        assert_eq!(appointment_start("2025-04-09", "14:30"), "2025-04-09T14:30:00");
        assert_eq!(appointment_start("2025-04-09", "09:05:00"), "2025-04-09T09:05:00");
    }

    #[test]
    fn test_meridiem_time() {
        assert_eq!(appointment_start("2025-04-09", "2:15 pm"), "2025-04-09T14:15:00");
        assert_eq!(appointment_start("2025-04-09", "12 a.m."), "2025-04-09T00:00:00");
        assert_eq!(appointment_start("2025-04-09", "12pm"), "2025-04-09T12:00:00");
        assert_eq!(appointment_start("2025-04-09", "9 AM"), "2025-04-09T09:00:00");
    }

    #[test]
    fn test_unparseable_slots_fall_back_to_concatenation() {
        assert_eq!(appointment_start("next friday", "noon"), "next fridayTnoon");
        assert_eq!(appointment_start("2025-04-09", "25:00"), "2025-04-09T25:00");
        assert_eq!(appointment_start("2025-04-09", "3"), "2025-04-09T3");
    }
}
