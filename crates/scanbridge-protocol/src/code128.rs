//! Code128 subset windows and MOD-103 check symbol.
//!
//! Scanners in ASCII mode normally strip the start, check and stop symbols
//! and only emit the printable payload, so most Code128 scans can only be
//! range-checked against their subset's character window. When the raw
//! framing survives (start value 103/104/105 first, stop value 106 last,
//! check symbol value immediately before the stop) the MOD-103 check symbol
//! is verified instead:
//!
//! ```text
//! sum = start + value(1) * 1 + value(2) * 2 + ... + value(n) * n
//! valid = sum % 103 == check
//! ```
//!
//! Framing symbols are read as raw character values, so the start codes show
//! up as `g`, `h`, `i` and the stop code as `j`.

use scanbridge_core::constants::{
    CODE128_MODULUS, CODE128_START_A, CODE128_START_B, CODE128_START_C, CODE128_STOP,
};
use scanbridge_core::{Error, Result, Symbology};

/// Code128 character subset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Code128Subset {
    A,
    B,
    C,
}

impl Code128Subset {
    #[must_use]
    pub fn start_value(self) -> u8 {
        match self {
            Code128Subset::A => CODE128_START_A,
            Code128Subset::B => CODE128_START_B,
            Code128Subset::C => CODE128_START_C,
        }
    }

    #[must_use]
    pub fn from_start_value(value: u32) -> Option<Self> {
        match value {
            v if v == u32::from(CODE128_START_A) => Some(Code128Subset::A),
            v if v == u32::from(CODE128_START_B) => Some(Code128Subset::B),
            v if v == u32::from(CODE128_START_C) => Some(Code128Subset::C),
            _ => None,
        }
    }

    #[must_use]
    pub fn symbology(self) -> Symbology {
        match self {
            Code128Subset::A => Symbology::Code128A,
            Code128Subset::B => Symbology::Code128B,
            Code128Subset::C => Symbology::Code128C,
        }
    }

    /// Symbol value of one character in subset A or B.
    ///
    /// Subset C encodes digit pairs and has no per-character value.
    #[must_use]
    pub fn symbol_value(self, c: char) -> Option<u32> {
        let code = u32::from(c);
        match self {
            Code128Subset::A => match code {
                32..=95 => Some(code - 32),
                0..=31 => Some(code + 64),
                _ => None,
            },
            Code128Subset::B => match code {
                32..=127 => Some(code - 32),
                _ => None,
            },
            Code128Subset::C => None,
        }
    }

    /// Range/structure check of a printable payload without framing.
    ///
    /// # Errors
    /// Returns `Error::InvalidFormat` naming the first offending character,
    /// or the structural problem for subset C.
    pub fn validate_printable(self, payload: &str) -> Result<()> {
        if payload.is_empty() {
            return Err(Error::invalid_format("empty Code128 payload"));
        }
        match self {
            Code128Subset::A => check_window(payload, 32, 95, self.symbology()),
            Code128Subset::B => check_window(payload, 32, 126, self.symbology()),
            Code128Subset::C => {
                if !payload.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(Error::invalid_format(format!(
                        "{} payload must be numeric",
                        self.symbology()
                    )));
                }
                if payload.len() % 2 != 0 {
                    return Err(Error::invalid_format(format!(
                        "{} payload must have an even number of digits, got {}",
                        self.symbology(),
                        payload.len()
                    )));
                }
                Ok(())
            }
        }
    }
}

/// Range check against the full printable window, used for AIM identifiers
/// that do not name a subset.
///
/// # Errors
/// Returns `Error::InvalidFormat` for an empty payload or a character outside
/// ASCII 32-126.
pub fn validate_generic(payload: &str) -> Result<()> {
    if payload.is_empty() {
        return Err(Error::invalid_format("empty Code128 payload"));
    }
    check_window(payload, 32, 126, Symbology::Code128Other)
}

fn check_window(payload: &str, min: u32, max: u32, symbology: Symbology) -> Result<()> {
    match payload
        .chars()
        .find(|c| !(min..=max).contains(&u32::from(*c)))
    {
        Some(c) => Err(Error::invalid_format(format!(
            "character {:?} is outside the {symbology} range {min}-{max}",
            c
        ))),
        None => Ok(()),
    }
}

/// MOD-103 check value over raw symbol values.
#[must_use]
pub fn mod103_checksum(start: u32, values: &[u32]) -> u32 {
    values
        .iter()
        .zip(1u32..)
        .fold(start, |sum, (value, weight)| (sum + value * weight) % CODE128_MODULUS)
        % CODE128_MODULUS
}

/// Returns `true` when the payload carries raw start/stop framing.
#[must_use]
pub fn is_raw_framed(payload: &str) -> bool {
    let mut chars = payload.chars();
    let (Some(first), Some(last)) = (chars.next(), chars.next_back()) else {
        return false;
    };
    // start, check and stop at minimum
    payload.chars().count() >= 3
        && Code128Subset::from_start_value(u32::from(first)).is_some()
        && u32::from(last) == u32::from(CODE128_STOP)
}

/// Verify the MOD-103 check symbol of a raw-framed payload.
///
/// Returns the subset named by the start code.
///
/// # Errors
/// `Error::InvalidFormat` when the framing is missing or a data character
/// cannot be mapped in the start code's subset, `Error::ChecksumMismatch`
/// when the declared check symbol is wrong.
pub fn validate_raw(payload: &str) -> Result<Code128Subset> {
    let chars: Vec<char> = payload.chars().collect();
    if !is_raw_framed(payload) {
        return Err(Error::invalid_format("missing Code128 start/stop framing"));
    }

    let start = u32::from(chars[0]);
    let subset = Code128Subset::from_start_value(start)
        .ok_or_else(|| Error::invalid_format(format!("unknown Code128 start value {start}")))?;
    let declared = u32::from(chars[chars.len() - 2]);
    let data = &chars[1..chars.len() - 2];

    let values = symbol_values(subset, data)?;
    let expected = mod103_checksum(start, &values);

    if expected == declared {
        Ok(subset)
    } else {
        Err(Error::checksum(expected, declared))
    }
}

fn symbol_values(subset: Code128Subset, data: &[char]) -> Result<Vec<u32>> {
    match subset {
        Code128Subset::C => {
            if data.len() % 2 != 0 {
                return Err(Error::invalid_format(
                    "Code128-C data must have an even number of digits",
                ));
            }
            data.chunks(2)
                .map(|pair| match (pair[0].to_digit(10), pair[1].to_digit(10)) {
                    (Some(hi), Some(lo)) => Ok(hi * 10 + lo),
                    _ => Err(Error::invalid_format(format!(
                        "Code128-C pair {:?} is not numeric",
                        pair.iter().collect::<String>()
                    ))),
                })
                .collect()
        }
        _ => data
            .iter()
            .map(|c| {
                subset.symbol_value(*c).ok_or_else(|| {
                    Error::invalid_format(format!(
                        "character {:?} has no {} symbol value",
                        c,
                        subset.symbology()
                    ))
                })
            })
            .collect(),
    }
}
