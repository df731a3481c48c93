//! Symbology detection and validation of scan lines.
//!
//! Detection is first-match-wins:
//!
//! 1. AIM identifier (`]` + letter + optional modifier): `]A`, `]B`, `]C` map
//!    to the Code128 subsets, any other letter to generic Code128.
//! 2. 13 digits: EAN-13.
//! 3. 12 digits: UPC-A.
//! 4. 8 digits starting with `0` or `1` that pass as UPC-E: UPC-E.
//! 5. Any other 8 digits: EAN-8 (valid only if its own check digit is).
//! 6. Other even-length digit strings: Code128-C.
//! 7. Raw-framed Code128: the subset named by the start code.
//! 8. ASCII 32-95 only: Code128-A.
//! 9. ASCII 32-126 only: Code128-B.
//! 10. Anything else: `UNKNOWN`, invalid.
//!
//! [`validate`] never fails: it always yields exactly one
//! [`ValidationResult`], with invalid scans described in its `error`.
//!
//! ```
//! use scanbridge_core::{ScanLine, Symbology};
//! use scanbridge_protocol::validate;
//!
//! let line = ScanLine::new("4006381333931").unwrap();
//! let result = validate(&line);
//! assert_eq!(result.symbology, Symbology::Ean13);
//! assert!(result.valid);
//! ```

use crate::checksum::{is_valid_mod10, validate_upce};
use crate::code128::{self, Code128Subset};
use scanbridge_core::constants::AIM_PREFIX;
use scanbridge_core::{Error, Result, ScanLine, Symbology, ValidationResult};

/// AIM symbology identifier at the head of a scan line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AimIdentifier {
    pub code: char,
    pub modifier: Option<char>,
}

impl AimIdentifier {
    #[must_use]
    pub fn symbology(&self) -> Symbology {
        match self.code {
            'A' => Symbology::Code128A,
            'B' => Symbology::Code128B,
            'C' => Symbology::Code128C,
            _ => Symbology::Code128Other,
        }
    }

    fn subset(&self) -> Option<Code128Subset> {
        match self.code {
            'A' => Some(Code128Subset::A),
            'B' => Some(Code128Subset::B),
            'C' => Some(Code128Subset::C),
            _ => None,
        }
    }
}

/// Split a leading AIM identifier off the line.
///
/// Returns the identifier and the remaining payload.
#[must_use]
pub fn split_aim_prefix(line: &str) -> Option<(AimIdentifier, &str)> {
    let rest = line.strip_prefix(AIM_PREFIX)?;
    let mut chars = rest.chars();
    let code = chars.next().filter(char::is_ascii_alphabetic)?;
    let after_code = chars.as_str();

    match after_code.chars().next().filter(char::is_ascii_alphanumeric) {
        Some(modifier) => Some((
            AimIdentifier {
                code,
                modifier: Some(modifier),
            },
            &after_code[modifier.len_utf8()..],
        )),
        None => Some((
            AimIdentifier {
                code,
                modifier: None,
            },
            after_code,
        )),
    }
}

/// Classify a line without keeping the validation outcome.
#[must_use]
pub fn detect(line: &str) -> Symbology {
    classify(line).0
}

/// Classify and validate one scan line.
#[must_use]
pub fn validate(line: &ScanLine) -> ValidationResult {
    validate_str(line.as_str())
}

/// Classify and validate raw text.
///
/// Callers holding a [`ScanLine`] should use [`validate`]; this entry point
/// accepts anything, including empty text, which is reported as `UNKNOWN`.
#[must_use]
pub fn validate_str(line: &str) -> ValidationResult {
    let (symbology, outcome) = classify(line);
    ValidationResult::from_outcome(line, symbology, outcome)
}

fn classify(line: &str) -> (Symbology, Result<()>) {
    if let Some((aim, payload)) = split_aim_prefix(line) {
        return classify_aim(aim, payload);
    }

    if !line.is_empty() && line.bytes().all(|b| b.is_ascii_digit()) {
        match line.len() {
            13 => return (Symbology::Ean13, is_valid_mod10(line)),
            12 => return (Symbology::UpcA, is_valid_mod10(line)),
            8 => {
                if line.starts_with(['0', '1']) && validate_upce(line).is_ok() {
                    return (Symbology::UpcE, Ok(()));
                }
                return (Symbology::Ean8, is_valid_mod10(line));
            }
            n if n % 2 == 0 => return (Symbology::Code128C, Ok(())),
            _ => {}
        }
    }

    if code128::is_raw_framed(line) {
        return classify_raw(line);
    }

    if in_window(line, 32, 95) {
        (Symbology::Code128A, Ok(()))
    } else if in_window(line, 32, 126) {
        (Symbology::Code128B, Ok(()))
    } else {
        (
            Symbology::Unknown,
            Err(Error::UnsupportedSymbology(line.escape_default().to_string())),
        )
    }
}

fn classify_aim(aim: AimIdentifier, payload: &str) -> (Symbology, Result<()>) {
    let symbology = aim.symbology();

    if code128::is_raw_framed(payload) {
        return (symbology, code128::validate_raw(payload).map(|_| ()));
    }

    let outcome = match aim.subset() {
        Some(subset) => subset.validate_printable(payload),
        None => code128::validate_generic(payload),
    };
    (symbology, outcome)
}

fn classify_raw(line: &str) -> (Symbology, Result<()>) {
    let named = line
        .chars()
        .next()
        .and_then(|c| Code128Subset::from_start_value(u32::from(c)))
        .map_or(Symbology::Code128B, Code128Subset::symbology);

    match code128::validate_raw(line) {
        Ok(subset) => (subset.symbology(), Ok(())),
        Err(e) => (named, Err(e)),
    }
}

fn in_window(line: &str, min: u32, max: u32) -> bool {
    !line.is_empty() && line.chars().all(|c| (min..=max).contains(&u32::from(c)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("4006381333931", Symbology::Ean13, true)]
    #[case("4006381333932", Symbology::Ean13, false)]
    #[case("036000291452", Symbology::UpcA, true)]
    #[case("036000291453", Symbology::UpcA, false)]
    #[case("01234565", Symbology::UpcE, true)]
    #[case("04252614", Symbology::UpcE, true)]
    #[case("04252610", Symbology::Ean8, true)]
    #[case("04252615", Symbology::Ean8, false)]
    #[case("96385074", Symbology::Ean8, true)]
    #[case("96385075", Symbology::Ean8, false)]
    #[case("123456", Symbology::Code128C, true)]
    #[case("12345", Symbology::Code128A, true)]
    #[case("ABC-123 /", Symbology::Code128A, true)]
    #[case("Hello, World!", Symbology::Code128B, true)]
    #[case("hABfj", Symbology::Code128B, true)]
    #[case("gABej", Symbology::Code128A, true)]
    #[case("i1234Rj", Symbology::Code128C, true)]
    #[case("hABgj", Symbology::Code128B, false)]
    #[case("caf\u{e9}", Symbology::Unknown, false)]
    #[case("", Symbology::Unknown, false)]
    fn test_validate_vectors(
        #[case] line: &str,
        #[case] symbology: Symbology,
        #[case] valid: bool,
    ) {
        let result = validate_str(line);
        assert_eq!(result.symbology, symbology, "symbology of {line:?}");
        assert_eq!(result.valid, valid, "validity of {line:?}");
        assert_eq!(result.error.is_none(), valid);
        assert_eq!(result.barcode, line);
    }

    #[rstest]
    #[case("]C0123456", Symbology::Code128C, true)]
    #[case("]C012345", Symbology::Code128C, false)]
    #[case("]A0ABC", Symbology::Code128A, true)]
    #[case("]A0abc", Symbology::Code128A, false)]
    #[case("]B1hello", Symbology::Code128B, true)]
    #[case("]E08410376012699d", Symbology::Code128Other, true)]
    #[case("]B0hABfj", Symbology::Code128B, true)]
    #[case("]B0hABgj", Symbology::Code128B, false)]
    #[case("]Q", Symbology::Code128Other, false)]
    fn test_aim_prefixed(#[case] line: &str, #[case] symbology: Symbology, #[case] valid: bool) {
        let result = validate_str(line);
        assert_eq!(result.symbology, symbology);
        assert_eq!(result.valid, valid);
    }

    #[test]
    fn test_split_aim_prefix() {
        let (aim, payload) = split_aim_prefix("]E08410376012699d").unwrap();
        assert_eq!(aim.code, 'E');
        assert_eq!(aim.modifier, Some('0'));
        assert_eq!(payload, "8410376012699d");

        let (aim, payload) = split_aim_prefix("]C").unwrap();
        assert_eq!(aim.modifier, None);
        assert_eq!(payload, "");

        assert!(split_aim_prefix("]0abc").is_none());
        assert!(split_aim_prefix("abc").is_none());
    }

    #[test]
    fn test_aim_identifier_takes_precedence_over_digits() {
        // Same digits without the identifier are EAN-13.
        assert_eq!(detect("]C04006381333931"), Symbology::Code128C);
        assert_eq!(detect("4006381333931"), Symbology::Ean13);
    }

    #[test]
    fn test_unknown_error_message() {
        let result = validate_str("\u{7f}\u{7f}");
        assert_eq!(result.symbology, Symbology::Unknown);
        assert!(
            result
                .error
                .unwrap()
                .starts_with("Unsupported or unrecognized format")
        );
    }

    #[test]
    fn test_upce_fallback_reports_ean8_checksum_error() {
        let result = validate_str("04252615");
        assert_eq!(result.symbology, Symbology::Ean8);
        assert!(result.error.unwrap().contains("Checksum mismatch"));
    }

    #[test]
    fn test_validate_scan_line() {
        let line = ScanLine::new("  01234565\0").unwrap();
        let result = validate(&line);
        assert_eq!(result.barcode, "01234565");
        assert_eq!(result.symbology, Symbology::UpcE);
        assert!(result.valid);
    }
}
