use tablelink_core::{Error, Result};

pub const NATIVE_DATE_LEN: usize = 7;
pub const ZERO_DATE: &str = "0000-00-00 00:00:00";

const CENTURY_BIAS: u8 = 100;
const YEAR_BIAS: u8 = 100;
const TIME_BIAS: u8 = 1;

/// Decodes the 7-byte native date into `YYYY-MM-DD HH:MM:SS`.
///
/// Bytes outside the valid ranges (including BC centuries) decode to [`ZERO_DATE`].
#[must_use]
pub fn decode_native_date(bytes: &[u8; NATIVE_DATE_LEN]) -> String {
    let [century, year, month, day, hour, minute, second] = *bytes;
    let valid = (CENTURY_BIAS..CENTURY_BIAS + 100).contains(&century)
        && (YEAR_BIAS..YEAR_BIAS + 100).contains(&year)
        && (1..=12).contains(&month)
        && (1..=31).contains(&day)
        && (TIME_BIAS..TIME_BIAS + 24).contains(&hour)
        && (TIME_BIAS..TIME_BIAS + 60).contains(&minute)
        && (TIME_BIAS..TIME_BIAS + 60).contains(&second);
    if !valid {
        return ZERO_DATE.to_string();
    }

    let full_year = u32::from(century - CENTURY_BIAS) * 100 + u32::from(year - YEAR_BIAS);
    format!(
        "{full_year:04}-{month:02}-{day:02} {:02}:{:02}:{:02}",
        hour - TIME_BIAS,
        minute - TIME_BIAS,
        second - TIME_BIAS
    )
}

/// Encodes `YYYY-MM-DD[ HH:MM:SS]` into the 7-byte native date.
pub fn encode_native_date(text: &str) -> Result<[u8; NATIVE_DATE_LEN]> {
    if text == ZERO_DATE {
        return Ok([0; NATIVE_DATE_LEN]);
    }

    let invalid = || Error::marshal(format!("`{text}` is not a YYYY-MM-DD HH:MM:SS value"));
    let (date, time) = match text.split_once(' ') {
        Some((date, time)) => (date, time),
        None => (text, "00:00:00"),
    };

    let date_parts = split_numbers(date, '-', [4, 2, 2]).ok_or_else(invalid)?;
    let time_parts = split_numbers(time, ':', [2, 2, 2]).ok_or_else(invalid)?;
    let [year, month, day] = date_parts;
    let [hour, minute, second] = time_parts;

    if year > 9999
        || !(1..=12).contains(&month)
        || !(1..=31).contains(&day)
        || hour > 23
        || minute > 59
        || second > 59
    {
        return Err(invalid());
    }

    Ok([
        (year / 100) as u8 + CENTURY_BIAS,
        (year % 100) as u8 + YEAR_BIAS,
        month as u8,
        day as u8,
        hour as u8 + TIME_BIAS,
        minute as u8 + TIME_BIAS,
        second as u8 + TIME_BIAS,
    ])
}

fn split_numbers(text: &str, separator: char, widths: [usize; 3]) -> Option<[u32; 3]> {
    let mut parts = text.split(separator);
    let mut values = [0u32; 3];
    for (value, width) in values.iter_mut().zip(widths) {
        let part = parts.next()?;
        if part.len() != width || !part.bytes().all(|byte| byte.is_ascii_digit()) {
            return None;
        }
        *value = part.parse().ok()?;
    }
    parts.next().is_none().then_some(values)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::{ZERO_DATE, decode_native_date, encode_native_date};

    #[test]
    fn century_boundary_dates_decode_exactly() {
        assert_eq!(
            decode_native_date(&[100, 100, 1, 1, 1, 1, 1]),
            "0000-01-01 00:00:00"
        );
        assert_eq!(
            decode_native_date(&[120, 100, 1, 1, 1, 1, 1]),
            "2000-01-01 00:00:00"
        );
        assert_eq!(
            decode_native_date(&[199, 199, 12, 31, 24, 60, 60]),
            "9999-12-31 23:59:59"
        );
    }

    #[test]
    fn invalid_century_decodes_to_zero_date() {
        assert_eq!(decode_native_date(&[99, 100, 1, 1, 1, 1, 1]), ZERO_DATE);
        assert_eq!(decode_native_date(&[0; 7]), ZERO_DATE);
        assert_eq!(encode_native_date(ZERO_DATE).expect("zero"), [0; 7]);
    }

    #[test]
    fn date_without_time_encodes_midnight() {
        assert_eq!(
            encode_native_date("2024-02-29").expect("encode"),
            [120, 124, 2, 29, 1, 1, 1]
        );
        assert!(encode_native_date("2024-13-01 00:00:00").is_err());
        assert!(encode_native_date("24-01-01").is_err());
    }

    proptest! {
        #[test]
        fn valid_bytes_round_trip(
            century in 100u8..200,
            year in 100u8..200,
            month in 1u8..=12,
            day in 1u8..=31,
            hour in 1u8..=24,
            minute in 1u8..=60,
            second in 1u8..=60,
        ) {
            let bytes = [century, year, month, day, hour, minute, second];
            let text = decode_native_date(&bytes);
            prop_assert_eq!(encode_native_date(&text).expect("encode"), bytes);
        }
    }
}
