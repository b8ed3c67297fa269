//! Jalali (Persian solar) calendar support and Gregorian cross-checks.
//!
//! Conversions use the 33-year break table of the astronomical Jalali
//! calendar, valid for Jalali years -61 ..= 3177. Gregorian arithmetic is
//! delegated to `chrono`.

use std::fmt::{Display, Formatter};
use std::sync::OnceLock;

use chrono::{Datelike, Days, NaiveDate};
use regex::Regex;

use crate::numerals::to_ascii_digits;

/// Jalali years at which the leap cycle shifts.
const BREAKS: [i32; 20] = [
    -61, 9, 38, 199, 426, 686, 756, 818, 1111, 1181, 1210, 1635, 2060, 2097, 2192, 2262, 2324,
    2394, 2456, 3178,
];

fn jalali_shape() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^([0-9]{4})/(0[1-9]|1[0-2])/(0[1-9]|[12][0-9]|3[01])$").expect("static regex")
    })
}

fn gregorian_shape() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[0-9]{4}-(0[1-9]|1[0-2])-(0[1-9]|[12][0-9]|3[01])$").expect("static regex")
    })
}

/// Leap-cycle facts for one Jalali year.
struct YearInfo {
    /// Years since the last leap year; 0 means this year is leap.
    leap: i32,
    /// Gregorian year in which this Jalali year starts.
    gy: i32,
    /// Day of March on which Farvardin 1 falls.
    march: u32,
}

fn year_info(jy: i32) -> Option<YearInfo> {
    let last = BREAKS[BREAKS.len() - 1];
    if jy < BREAKS[0] || jy >= last {
        return None;
    }
    let gy = jy + 621;
    let mut leap_j = -14;
    let mut jp = BREAKS[0];
    let mut jump = 0;
    for &jm in &BREAKS[1..] {
        jump = jm - jp;
        if jy < jm {
            break;
        }
        leap_j += jump / 33 * 8 + (jump % 33) / 4;
        jp = jm;
    }
    let mut n = jy - jp;

    leap_j += n / 33 * 8 + ((n % 33) + 3) / 4;
    if jump % 33 == 4 && jump - n == 4 {
        leap_j += 1;
    }
    let leap_g = gy / 4 - ((gy / 100 + 1) * 3) / 4 - 150;
    let march = 20 + leap_j - leap_g;

    if jump - n < 6 {
        n = n - jump + (jump + 4) / 33 * 33;
    }
    let mut leap = (((n + 1) % 33) - 1) % 4;
    if leap == -1 {
        leap = 4;
    }
    Some(YearInfo {
        leap,
        gy,
        march: u32::try_from(march).ok()?,
    })
}

/// A validated Jalali calendar date.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JalaliDate {
    year: i32,
    month: u32,
    day: u32,
}

impl JalaliDate {
    pub fn new(year: i32, month: u32, day: u32) -> Option<Self> {
        if !(1..=12).contains(&month) || day < 1 {
            return None;
        }
        let len = Self::month_length(year, month)?;
        if day > len {
            return None;
        }
        Some(Self { year, month, day })
    }

    /// Parse `YYYY/MM/DD`; Persian digits are accepted.
    pub fn parse(s: &str) -> Option<Self> {
        let ascii = to_ascii_digits(s.trim());
        let caps = jalali_shape().captures(&ascii)?;
        let year = caps[1].parse().ok()?;
        let month = caps[2].parse().ok()?;
        let day = caps[3].parse().ok()?;
        Self::new(year, month, day)
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn day(&self) -> u32 {
        self.day
    }

    pub fn is_leap_year(year: i32) -> Option<bool> {
        year_info(year).map(|info| info.leap == 0)
    }

    /// Days in `month` of `year`, or `None` for an unsupported year/month.
    pub fn month_length(year: i32, month: u32) -> Option<u32> {
        match month {
            1..=6 => year_info(year).map(|_| 31),
            7..=11 => year_info(year).map(|_| 30),
            12 => Self::is_leap_year(year).map(|leap| if leap { 30 } else { 29 }),
            _ => None,
        }
    }

    /// Zero-based day index within the year.
    fn day_of_year(&self) -> u64 {
        let m = self.month as u64;
        let before = if m <= 7 {
            (m - 1) * 31
        } else {
            6 * 31 + (m - 7) * 30
        };
        before + self.day as u64 - 1
    }

    pub fn to_gregorian(&self) -> Option<NaiveDate> {
        let info = year_info(self.year)?;
        let nowruz = NaiveDate::from_ymd_opt(info.gy, 3, info.march)?;
        nowruz.checked_add_days(Days::new(self.day_of_year()))
    }

    pub fn from_gregorian(date: NaiveDate) -> Option<Self> {
        let gy = date.year();
        let mut jy = gy - 621;
        let info = year_info(jy)?;
        let nowruz = NaiveDate::from_ymd_opt(gy, 3, info.march)?;
        let mut k = (date - nowruz).num_days();

        let (month, day) = if k >= 0 {
            if k <= 185 {
                (1 + k / 31, k % 31 + 1)
            } else {
                k -= 186;
                (7 + k / 30, k % 30 + 1)
            }
        } else {
            jy -= 1;
            k += 179;
            if info.leap == 1 {
                k += 1;
            }
            (7 + k / 30, k % 30 + 1)
        };
        Self::new(jy, u32::try_from(month).ok()?, u32::try_from(day).ok()?)
    }
}

impl Display for JalaliDate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}/{:02}/{:02}", self.year, self.month, self.day)
    }
}

fn parse_gregorian(s: &str) -> Option<NaiveDate> {
    let ascii = to_ascii_digits(s.trim());
    if !gregorian_shape().is_match(&ascii) {
        return None;
    }
    NaiveDate::parse_from_str(&ascii, "%Y-%m-%d").ok()
}

fn format_gregorian(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub fn is_valid_jalali(s: &str) -> bool {
    JalaliDate::parse(s).is_some()
}

pub fn is_valid_gregorian(s: &str) -> bool {
    parse_gregorian(s).is_some()
}

/// Convert `YYYY/MM/DD` (Jalali) to `YYYY-MM-DD` (Gregorian).
pub fn jalali_to_gregorian(s: &str) -> Option<String> {
    JalaliDate::parse(s)?.to_gregorian().map(format_gregorian)
}

/// Convert `YYYY-MM-DD` (Gregorian) to `YYYY/MM/DD` (Jalali).
pub fn gregorian_to_jalali(s: &str) -> Option<String> {
    let date = parse_gregorian(s)?;
    JalaliDate::from_gregorian(date).map(|j| j.to_string())
}

/// Both dates valid and naming the same day.
pub fn dates_consistent(jalali: &str, gregorian: &str) -> bool {
    if !is_valid_gregorian(gregorian) {
        return false;
    }
    match jalali_to_gregorian(jalali) {
        Some(converted) => converted == gregorian,
        None => false,
    }
}
