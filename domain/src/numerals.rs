//! Localized numeral parsing and integer display formatting.

/// Persian digit glyphs, indexed by their ASCII value.
const PERSIAN_DIGITS: [char; 10] = ['۰', '۱', '۲', '۳', '۴', '۵', '۶', '۷', '۸', '۹'];

/// Digit glyph set a numeral string is written in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NumeralSystem {
    Ascii,
    Persian,
}

impl NumeralSystem {
    /// Persian if any Persian digit appears in `s`, ASCII otherwise.
    pub fn detect(s: &str) -> Self {
        if s.chars().any(|c| PERSIAN_DIGITS.contains(&c)) {
            NumeralSystem::Persian
        } else {
            NumeralSystem::Ascii
        }
    }
}

fn persian_to_ascii(c: char) -> Option<char> {
    PERSIAN_DIGITS
        .iter()
        .position(|&d| d == c)
        .and_then(|i| char::from_digit(i as u32, 10))
}

/// Replace Persian digits with ASCII digits, leaving everything else as-is.
pub fn to_ascii_digits(s: &str) -> String {
    s.chars().map(|c| persian_to_ascii(c).unwrap_or(c)).collect()
}

/// Parse a localized numeral string such as `"۶,۰۰۰,۰۰۰"` or `"6,000,000"`.
///
/// Thousands separators and whitespace are ignored. Returns `None` when the
/// remainder is not a finite number.
pub fn parse_localized_number(s: &str) -> Option<f64> {
    let mut ascii = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            ',' | '٬' | '،' => {}
            c if c.is_whitespace() => {}
            '٫' => ascii.push('.'),
            c => ascii.push(persian_to_ascii(c).unwrap_or(c)),
        }
    }
    // f64::from_str also accepts "inf"/"NaN"; only plain decimals count here.
    if ascii.is_empty()
        || !ascii
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+'))
    {
        return None;
    }
    ascii.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Round `value` to an integer and render it with `,` thousands grouping in
/// the given digit system.
pub fn format_integer(value: f64, system: NumeralSystem) -> String {
    let rounded = value.round();
    let negative = rounded < 0.0;
    let digits = format!("{:.0}", rounded.abs());

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if negative {
        grouped.push('-');
    }
    let len = digits.len();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            grouped.push(',');
        }
        match system {
            NumeralSystem::Ascii => grouped.push(c),
            NumeralSystem::Persian => {
                let idx = c.to_digit(10).unwrap_or(0) as usize;
                grouped.push(PERSIAN_DIGITS[idx]);
            }
        }
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persian_and_ascii_parse_to_the_same_value() {
        let pairs = [
            ("۶,۰۰۰,۰۰۰", "6000000"),
            ("۱۲۳۴۵۶۷۸۹۰", "1234567890"),
            ("۷ ۲۰۰ ۰۰۰", "7200000"),
            ("۱۲٫۵", "12.5"),
            ("۰", "0"),
        ];
        for (localized, ascii) in pairs {
            let expected: f64 = ascii.parse().unwrap();
            assert_eq!(parse_localized_number(localized), Some(expected), "{localized}");
        }
        assert_eq!(parse_localized_number("8,000,000"), Some(8_000_000.0));
    }

    #[test]
    fn rejects_non_numeric_residue() {
        assert_eq!(parse_localized_number(""), None);
        assert_eq!(parse_localized_number("  "), None);
        assert_eq!(parse_localized_number("12 تومان"), None);
        assert_eq!(parse_localized_number("inf"), None);
        assert_eq!(parse_localized_number("NaN"), None);
        assert_eq!(parse_localized_number("1.2.3"), None);
    }

    #[test]
    fn formats_with_grouping() {
        assert_eq!(format_integer(7_200_000.0, NumeralSystem::Ascii), "7,200,000");
        assert_eq!(format_integer(999.6, NumeralSystem::Ascii), "1,000");
        assert_eq!(format_integer(12.0, NumeralSystem::Ascii), "12");
        assert_eq!(format_integer(5_400_000.0, NumeralSystem::Persian), "۵,۴۰۰,۰۰۰");
        assert_eq!(format_integer(-1234.0, NumeralSystem::Ascii), "-1,234");
    }

    #[test]
    fn detects_numeral_system() {
        assert_eq!(NumeralSystem::detect("۶,۰۰۰"), NumeralSystem::Persian);
        assert_eq!(NumeralSystem::detect("6,000"), NumeralSystem::Ascii);
        assert_eq!(to_ascii_digits("۱۴۰۴/۰۴/۰۱"), "1404/04/01");
    }
}
