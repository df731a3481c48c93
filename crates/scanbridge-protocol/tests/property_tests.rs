//! Property-based tests for the framer and the check-digit library.
//!
//! These tests use proptest to generate random byte streams and digit
//! strings and verify that framing and checksum invariants hold for all of
//! them.

use proptest::prelude::*;
use scanbridge_core::Symbology;
use scanbridge_protocol::{
    LineFramer, compress_upca, expand_upce, is_valid_mod10, mod10_check_digit, validate_str,
};

/// Strategy for scanner-like byte streams: payload, terminators and noise.
fn scanner_stream() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(
        prop_oneof![
            6 => 0x20u8..=0x7E,
            2 => Just(b'\r'),
            1 => any::<u8>(),
        ],
        0..400,
    )
}

/// Strategy for split points into a stream of `len` bytes.
fn split_points(len: usize) -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(0..=len, 0..16).prop_map(|mut points| {
        points.sort_unstable();
        points
    })
}

/// Strategy for syntactically valid UPC-E codes (number system 0 or 1).
fn upce_code() -> impl Strategy<Value = String> {
    prop::string::string_regex("[01][0-9]{7}").expect("Failed to create UPC-E regex strategy")
}

/// Strategy for data digits of the fixed-length EAN/UPC symbologies.
fn ean_upc_data() -> impl Strategy<Value = String> {
    prop_oneof![
        prop::string::string_regex("[0-9]{12}").expect("Failed to create EAN-13 regex strategy"),
        prop::string::string_regex("[0-9]{11}").expect("Failed to create UPC-A regex strategy"),
        prop::string::string_regex("[2-9][0-9]{6}").expect("Failed to create EAN-8 regex strategy"),
    ]
}

fn frame_all(stream: &[u8], splits: &[usize]) -> Vec<String> {
    let mut framer = LineFramer::new();
    let mut out = Vec::new();
    let mut start = 0;
    for &point in splits.iter().chain(std::iter::once(&stream.len())) {
        framer.feed(&stream[start..point]);
        out.extend(framer.drain_lines().map(|l| l.into_inner()));
        start = point;
    }
    out.extend(framer.flush().map(|l| l.into_inner()));
    out
}

/// Reference framing: filter, split on CR, clean, drop empties.
fn reference_lines(stream: &[u8]) -> Vec<String> {
    let filtered: Vec<u8> = stream
        .iter()
        .copied()
        .filter(|b| *b == b'\r' || (0x20..=0x7E).contains(b))
        .collect();
    filtered
        .split(|b| *b == b'\r')
        .map(|part| String::from_utf8_lossy(part).trim().to_string())
        .filter(|line| !line.is_empty())
        .collect()
}

proptest! {
    /// Property: emitted lines do not depend on how the stream was chunked.
    #[test]
    fn prop_framer_chunk_boundary_invariance(
        (stream, splits) in scanner_stream().prop_flat_map(|s| {
            let len = s.len();
            (Just(s), split_points(len))
        })
    ) {
        let chunked = frame_all(&stream, &splits);
        let single = frame_all(&stream, &[]);

        prop_assert_eq!(&chunked, &single);
        prop_assert_eq!(chunked, reference_lines(&stream));
    }

    /// Property: the computed check digit completes a valid code, and the
    /// validator agrees.
    #[test]
    fn prop_mod10_reproduces_check_digit(data in ean_upc_data()) {
        let check = mod10_check_digit(&data).unwrap();
        let code = format!("{data}{check}");

        prop_assert!(is_valid_mod10(&code).is_ok());

        let result = validate_str(&code);
        prop_assert!(result.valid);
        prop_assert!(result.symbology.is_ean_upc());
    }

    /// Property: changing any single digit of a valid code invalidates it.
    #[test]
    fn prop_single_digit_mutation_invalidates(
        data in ean_upc_data(),
        position in any::<prop::sample::Index>(),
        delta in 1u8..=9,
    ) {
        let check = mod10_check_digit(&data).unwrap();
        let mut digits: Vec<u8> = format!("{data}{check}").into_bytes();
        let i = position.index(digits.len());
        digits[i] = b'0' + (digits[i] - b'0' + delta) % 10;
        let mutated = String::from_utf8(digits).unwrap();

        prop_assert!(is_valid_mod10(&mutated).is_err());
    }

    /// Property: a wrong check digit is never accepted by the validator.
    #[test]
    fn prop_wrong_check_digit_flips_validity(data in ean_upc_data(), delta in 1u8..=9) {
        let check = mod10_check_digit(&data).unwrap();
        let wrong = (check + delta) % 10;
        let code = format!("{data}{wrong}");

        let result = validate_str(&code);
        prop_assert!(!result.valid);
        prop_assert!(result.symbology.is_ean_upc());
    }

    /// Property: UPC-E expansion is total over valid shapes and keeps the
    /// number system and check digit.
    #[test]
    fn prop_upce_expansion_is_total(code in upce_code()) {
        let expanded = expand_upce(&code).unwrap();

        prop_assert_eq!(expanded.len(), 12);
        prop_assert!(expanded.bytes().all(|b| b.is_ascii_digit()));
        prop_assert_eq!(&expanded[..1], &code[..1]);
        prop_assert_eq!(&expanded[11..], &code[7..]);
        prop_assert_eq!(expand_upce(&code).unwrap(), expanded);
    }

    /// Property: compressing an expansion lands in the same zero-pattern
    /// class.
    #[test]
    fn prop_upce_bucket_round_trip(code in upce_code()) {
        let expanded = expand_upce(&code).unwrap();
        let compressed = compress_upca(&expanded);

        prop_assert!(compressed.is_some());
        prop_assert_eq!(expand_upce(&compressed.unwrap()).unwrap(), expanded);
    }

    /// Property: an 8-digit code that is not a valid UPC-E is EAN-8, never
    /// Code128.
    #[test]
    fn prop_eight_digits_stay_in_ean_upc(code in prop::string::string_regex("[0-9]{8}").unwrap()) {
        let result = validate_str(&code);
        prop_assert!(matches!(result.symbology, Symbology::UpcE | Symbology::Ean8));
    }
}
