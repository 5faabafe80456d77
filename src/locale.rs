//! Portuguese (pt-BR) date labels used in mails and on the dashboard.

use chrono::{DateTime, Datelike, TimeZone, Timelike};

const MONTHS: [&str; 12] = [
    "janeiro",
    "fevereiro",
    "março",
    "abril",
    "maio",
    "junho",
    "julho",
    "agosto",
    "setembro",
    "outubro",
    "novembro",
    "dezembro",
];

pub fn month_name(month: u32) -> &'static str {
    MONTHS[(month.clamp(1, 12) - 1) as usize]
}

/// "18 de outubro, às 19:30h"
pub fn format_schedule<Tz: TimeZone>(ts: &DateTime<Tz>) -> String {
    format!(
        "{} de {}, às {:02}:{:02}h",
        ts.day(),
        month_name(ts.month()),
        ts.hour(),
        ts.minute()
    )
}

/// "18 de outubro de 2026"
pub fn format_day<Tz: TimeZone>(ts: &DateTime<Tz>) -> String {
    format!("{} de {} de {}", ts.day(), month_name(ts.month()), ts.year())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_format_schedule() {
        let ts = Utc.with_ymd_and_hms(2026, 3, 5, 9, 7, 0).unwrap();
        assert_eq!(format_schedule(&ts), "5 de março, às 09:07h");
    }

    #[test]
    fn test_format_day() {
        let ts = Utc.with_ymd_and_hms(2026, 10, 18, 23, 59, 0).unwrap();
        assert_eq!(format_day(&ts), "18 de outubro de 2026");
    }
}
