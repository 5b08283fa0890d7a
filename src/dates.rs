//! ISO `YYYY-MM-DD` helpers shared across the API surface.

use time::format_description::FormatItem;
use time::macros::format_description;
use time::Date;

pub const DATE_FORMAT: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");

pub fn parse_iso_date(s: &str) -> Option<Date> {
    Date::parse(s, DATE_FORMAT).ok()
}

pub fn format_iso_date(date: Date) -> String {
    date.format(DATE_FORMAT).unwrap_or_default()
}
