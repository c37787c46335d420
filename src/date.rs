//! Calendar helpers
//!
//! Dates cross the renderer boundary as `yyyy-mm-dd` strings and are
//! persisted as packed `yyyymmdd` integers. Conversion is exact and must
//! round-trip.

use chrono::{Datelike, Days, Local, NaiveDate};

/// Packed `yyyymmdd` calendar date, e.g. `20240501`
pub type Ymd = u32;

/// Pack a calendar date into `yyyymmdd` form
pub fn pack(date: NaiveDate) -> Ymd {
    date.year() as u32 * 10_000 + date.month() * 100 + date.day()
}

/// Convert a `yyyy-mm-dd` wire date to packed form.
/// `None` for anything that is not a real calendar date.
pub fn convert_date(wire: &str) -> Option<Ymd> {
    NaiveDate::parse_from_str(wire, "%Y-%m-%d").ok().map(pack)
}

/// Format a packed date back to its `yyyy-mm-dd` wire form
pub fn to_wire(date: Ymd) -> String {
    format!(
        "{:04}-{:02}-{:02}",
        date / 10_000,
        date / 100 % 100,
        date % 100
    )
}

/// Month and day components of a packed date
pub fn month_day(date: Ymd) -> (u32, u32) {
    (date / 100 % 100, date % 100)
}

/// Today's date in packed form, local clock
pub fn today() -> Ymd {
    pack(Local::now().date_naive())
}

/// Add whole days to a packed date.
/// `None` if the input does not unpack to a real date.
pub fn plus_days(date: Ymd, days: u64) -> Option<Ymd> {
    let unpacked = NaiveDate::from_ymd_opt(
        (date / 10_000) as i32,
        date / 100 % 100,
        date % 100,
    )?;
    unpacked.checked_add_days(Days::new(days)).map(pack)
}
