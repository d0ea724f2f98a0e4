//! Text/byte conversion for the feeder's line protocol.
//!
//! Commands and reports are 7-bit ASCII text with no terminator or length
//! prefix. Each character maps to exactly one byte.

use bytes::Bytes;

/// Encode command text into the payload written to the feeder.
///
/// Characters outside the byte range are truncated to their low eight bits,
/// which is only meaningful for ASCII input.
pub fn encode(text: &str) -> Bytes {
    text.chars().map(|c| c as u32 as u8).collect::<Vec<u8>>().into()
}

/// Decode a notification payload into text, one character per byte.
pub fn decode(payload: &[u8]) -> String {
    payload.iter().map(|&b| char::from(b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_encode_has_no_terminator() {
        assert_eq!(&encode("list")[..], b"list");
        assert_eq!(&encode("now 633787650")[..], b"now 633787650");
        assert!(encode("").is_empty());
    }

    #[test]
    fn test_decode_preserves_length() {
        let payload = [b'o', b'k', 0xE9, 0x00];
        assert_eq!(decode(&payload).chars().count(), payload.len());
    }

    #[test]
    fn test_non_ascii_is_truncated() {
        // U+0141 truncates to 0x41 ('A').
        assert_eq!(&encode("\u{0141}")[..], b"A");
    }

    proptest! {
        #[test]
        fn printable_ascii_round_trips(s in "[ -~]{0,64}") {
            prop_assert_eq!(decode(&encode(&s)), s);
        }
    }
}
