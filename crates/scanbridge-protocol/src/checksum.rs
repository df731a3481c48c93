//! Check-digit arithmetic for the EAN/UPC family.
//!
//! # MOD-10
//!
//! Data digits are weighted 3, 1, 3, 1, ... starting from the rightmost data
//! digit (the one immediately left of the check digit). The check digit is
//! `(10 - sum % 10) % 10`.
//!
//! # UPC-E
//!
//! An 8-digit UPC-E code (number system, six data digits, check digit) is
//! validated by expanding it to UPC-A with the fixed table keyed on the last
//! data digit, then applying MOD-10 to the expansion. The UPC-E check digit
//! carries over unchanged.
//!
//! | Last data digit | UPC-A body (`S` = number system) |
//! |-----------------|----------------------------------|
//! | 0, 1, 2         | `S d1 d2 d6 0 0 0 0 d3 d4 d5`    |
//! | 3               | `S d1 d2 d3 0 0 0 0 0 d4 d5`     |
//! | 4               | `S d1 d2 d3 d4 0 0 0 0 0 d5`     |
//! | 5 - 9           | `S d1 d2 d3 d4 d5 0 0 0 0 d6`    |
//!
//! ```
//! use scanbridge_protocol::checksum::{expand_upce, is_valid_mod10};
//!
//! assert_eq!(expand_upce("01234565").unwrap(), "012345000065");
//! assert!(is_valid_mod10("4006381333931").is_ok());
//! ```

use scanbridge_core::{Error, Result};

fn digits(code: &str) -> Result<Vec<u8>> {
    code.bytes()
        .map(|b| {
            if b.is_ascii_digit() {
                Ok(b - b'0')
            } else {
                Err(Error::invalid_format(format!(
                    "'{code}' contains non-digit characters"
                )))
            }
        })
        .collect()
}

/// Compute the MOD-10 check digit of the data digits (check digit excluded).
///
/// # Errors
/// Returns `Error::InvalidFormat` if `data` is empty or not all digits.
pub fn mod10_check_digit(data: &str) -> Result<u8> {
    if data.is_empty() {
        return Err(Error::invalid_format("no data digits"));
    }

    let sum: u32 = digits(data)?
        .iter()
        .rev()
        .enumerate()
        .map(|(i, d)| u32::from(*d) * if i % 2 == 0 { 3 } else { 1 })
        .sum();

    Ok(((10 - sum % 10) % 10) as u8)
}

/// Validate a code whose last digit is a MOD-10 check digit.
///
/// # Errors
/// `Error::InvalidFormat` for fewer than two digits or non-digits,
/// `Error::ChecksumMismatch` when the check digit is wrong.
pub fn is_valid_mod10(code: &str) -> Result<()> {
    if code.len() < 2 {
        return Err(Error::invalid_format(format!(
            "'{code}' is too short for a check digit"
        )));
    }

    let (data, check) = code.split_at(code.len() - 1);
    let expected = mod10_check_digit(data)?;
    let actual = digits(check)?[0];

    if expected == actual {
        Ok(())
    } else {
        Err(Error::checksum(expected, actual))
    }
}

/// Expand an 8-digit UPC-E code to its 12-digit UPC-A form.
///
/// # Errors
/// Returns `Error::InvalidFormat` unless `code` is exactly 8 digits with
/// number system 0 or 1.
pub fn expand_upce(code: &str) -> Result<String> {
    if code.len() != 8 {
        return Err(Error::invalid_format(format!(
            "UPC-E requires exactly 8 digits, got {}",
            code.len()
        )));
    }
    let d = digits(code)?;
    if d[0] > 1 {
        return Err(Error::invalid_format(format!(
            "UPC-E number system must be 0 or 1, got {}",
            d[0]
        )));
    }

    let (ns, m, check) = (d[0], &d[1..7], d[7]);
    let body: [u8; 10] = match m[5] {
        0..=2 => [m[0], m[1], m[5], 0, 0, 0, 0, m[2], m[3], m[4]],
        3 => [m[0], m[1], m[2], 0, 0, 0, 0, 0, m[3], m[4]],
        4 => [m[0], m[1], m[2], m[3], 0, 0, 0, 0, 0, m[4]],
        _ => [m[0], m[1], m[2], m[3], m[4], 0, 0, 0, 0, m[5]],
    };

    Ok(std::iter::once(ns)
        .chain(body)
        .chain(std::iter::once(check))
        .map(|d| char::from(b'0' + d))
        .collect())
}

/// Validate a UPC-E code through its UPC-A expansion.
///
/// # Errors
/// Propagates the shape errors of [`expand_upce`] and the checksum errors of
/// [`is_valid_mod10`].
pub fn validate_upce(code: &str) -> Result<()> {
    is_valid_mod10(&expand_upce(code)?)
}

/// Compress a 12-digit UPC-A code to UPC-E, when its zero pattern allows.
///
/// Returns `None` for malformed input, number systems other than 0 or 1, and
/// codes whose manufacturer/product digits fit none of the expansion rows.
/// For every valid UPC-E `x`, `expand_upce(compress_upca(expand_upce(x)))`
/// equals `expand_upce(x)`.
#[must_use]
pub fn compress_upca(code: &str) -> Option<String> {
    if code.len() != 12 {
        return None;
    }
    let d = digits(code).ok()?;
    if d[0] > 1 {
        return None;
    }

    let (man, prod) = (&d[1..6], &d[6..11]);
    let data: [u8; 6] = if man[3..5] == [0, 0] && man[2] <= 2 && prod[..2] == [0, 0] {
        [man[0], man[1], prod[2], prod[3], prod[4], man[2]]
    } else if man[3..5] == [0, 0] && prod[..3] == [0, 0, 0] {
        [man[0], man[1], man[2], prod[3], prod[4], 3]
    } else if man[4] == 0 && prod[..4] == [0, 0, 0, 0] {
        [man[0], man[1], man[2], man[3], prod[4], 4]
    } else if prod[..4] == [0, 0, 0, 0] && prod[4] >= 5 {
        [man[0], man[1], man[2], man[3], man[4], prod[4]]
    } else {
        return None;
    };

    Some(
        std::iter::once(d[0])
            .chain(data)
            .chain(std::iter::once(d[11]))
            .map(|d| char::from(b'0' + d))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("400638133393", 1)]
    #[case("03600029145", 2)]
    #[case("9638507", 4)]
    #[case("01234500006", 5)]
    fn test_mod10_check_digit(#[case] data: &str, #[case] expected: u8) {
        assert_eq!(mod10_check_digit(data).unwrap(), expected);
    }

    #[rstest]
    #[case("4006381333931")] // EAN-13
    #[case("036000291452")] // UPC-A
    #[case("96385074")] // EAN-8
    fn test_valid_mod10(#[case] code: &str) {
        assert!(is_valid_mod10(code).is_ok());
    }

    #[test]
    fn test_wrong_check_digit() {
        let err = is_valid_mod10("4006381333932").unwrap_err();
        assert!(matches!(
            err,
            Error::ChecksumMismatch { ref expected, ref actual } if expected == "1" && actual == "2"
        ));
    }

    #[rstest]
    #[case("")]
    #[case("7")]
    #[case("40063813339A1")]
    fn test_mod10_malformed(#[case] code: &str) {
        assert!(matches!(is_valid_mod10(code), Err(Error::InvalidFormat(_))));
    }

    #[rstest]
    #[case("01234565", "012345000065")] // last data digit 6
    #[case("04252614", "042100005264")] // 1
    #[case("01234133", "012300000413")] // 3
    #[case("01234143", "012340000013")] // 4
    #[case("12345670", "123456000070")] // 7
    fn test_expand_upce_table(#[case] upce: &str, #[case] upca: &str) {
        assert_eq!(expand_upce(upce).unwrap(), upca);
    }

    #[rstest]
    #[case("0123456")]
    #[case("012345650")]
    #[case("21234565")]
    #[case("0123456X")]
    fn test_expand_upce_rejects_shape(#[case] code: &str) {
        assert!(matches!(expand_upce(code), Err(Error::InvalidFormat(_))));
    }

    #[test]
    fn test_validate_upce() {
        assert!(validate_upce("01234565").is_ok());
        assert!(matches!(
            validate_upce("01234566"),
            Err(Error::ChecksumMismatch { .. })
        ));
    }

    #[rstest]
    #[case("012345000065", Some("01234565"))]
    #[case("042100005264", Some("04252614"))]
    #[case("012300000413", Some("01234133"))]
    #[case("012340000013", Some("01234143"))]
    #[case("036000291452", None)]
    #[case("412345000065", None)]
    #[case("0123", None)]
    fn test_compress_upca(#[case] upca: &str, #[case] expected: Option<&str>) {
        assert_eq!(compress_upca(upca).as_deref(), expected);
    }
}
