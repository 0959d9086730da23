//! Host wire format
//!
//! The host application exchanges single-line, sequence-numbered text
//! records through the shared file pair: `"<number> <text>"` in both
//! directions, encoded UTF-16LE with a byte-order mark. Two payloads are
//! reserved: the no-value sentinel for commands that execute without
//! returning data, and the error prefix the host emits when its command
//! processor rejects a command. The two must never be conflated; a
//! sentinel is a perfectly normal outcome.

/// Payload meaning "command executed, nothing to return".
pub const NO_VALUE_SENTINEL: &str = "None";

/// Prefix the host puts on a payload when command execution failed.
/// The leading space survives the number/payload split.
pub const DEVICE_ERROR_PREFIX: &str = " ERROR:";

const BOM: u16 = 0xFEFF;
const BOM_SWAPPED: u16 = 0xFFFE;

/// Classification of a matched response payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Payload carrying data, verbatim.
    Value(String),
    /// The reserved "no value" sentinel.
    NoValue,
    /// The host reported an explicit failure; carries the message with the
    /// marker stripped.
    DeviceError(String),
}

/// Render a numbered record: `"<sequence_number> <text>"`.
pub fn format_numbered(sequence_number: u32, text: &str) -> String {
    format!("{sequence_number} {text}")
}

/// Split `"<number> <payload>"`.
///
/// `None` when the leading token is not an unsigned integer or no payload
/// follows; the caller treats that as "no response yet" and keeps polling.
pub fn split_numbered(content: &str) -> Option<(u32, &str)> {
    let (number, payload) = content.split_once(' ')?;
    let number = number.parse().ok()?;
    Some((number, payload))
}

/// Classify a matched payload.
pub fn classify(payload: &str) -> Outcome {
    if let Some(message) = payload.strip_prefix(DEVICE_ERROR_PREFIX) {
        Outcome::DeviceError(message.trim().to_string())
    } else if payload == NO_VALUE_SENTINEL {
        Outcome::NoValue
    } else {
        Outcome::Value(payload.to_string())
    }
}

/// Encode a record the way the host expects: UTF-16LE preceded by a BOM.
pub fn encode_utf16le(text: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(2 + text.len() * 2);
    for unit in std::iter::once(BOM).chain(text.encode_utf16()) {
        bytes.extend_from_slice(&unit.to_le_bytes());
    }
    bytes
}

/// Decode UTF-16 bytes, honoring a little- or big-endian byte-order mark
/// and assuming little-endian when none is present.
///
/// `None` for odd lengths or invalid surrogates: the host may be caught
/// mid-write, so undecodable content means "read again later".
pub fn decode_utf16(bytes: &[u8]) -> Option<String> {
    if bytes.len() % 2 != 0 {
        return None;
    }
    let mut units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    match units.first() {
        Some(&BOM) => {
            units.remove(0);
        }
        Some(&BOM_SWAPPED) => {
            units.remove(0);
            for unit in &mut units {
                *unit = unit.swap_bytes();
            }
        }
        _ => {}
    }
    String::from_utf16(&units).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn numbered_record_round_trip() {
        let record = format_numbered(42, "LoadMethod _METHPATH$, \"run.M\"");
        assert_eq!(
            split_numbered(&record),
            Some((42, "LoadMethod _METHPATH$, \"run.M\""))
        );
    }

    #[test]
    fn split_rejects_malformed_records() {
        assert_eq!(split_numbered(""), None);
        assert_eq!(split_numbered("no-number here"), None);
        assert_eq!(split_numbered("42"), None);
        assert_eq!(split_numbered("-3 negative"), None);
    }

    #[test]
    fn classify_distinguishes_sentinel_error_and_value() {
        assert_eq!(classify("None"), Outcome::NoValue);
        assert_eq!(
            classify(" ERROR: disk full"),
            Outcome::DeviceError("disk full".to_string())
        );
        assert_eq!(
            classify("C:\\Chem32\\1\\Methods"),
            Outcome::Value("C:\\Chem32\\1\\Methods".to_string())
        );
        // A payload merely containing the sentinel is still a value.
        assert_eq!(
            classify("None of the above"),
            Outcome::Value("None of the above".to_string())
        );
    }

    #[test]
    fn error_payload_survives_numbered_split() {
        // "<n>  ERROR: ...": the split eats one space, the marker keeps its own.
        let (number, payload) = split_numbered("17  ERROR: INVALID COMMAND").unwrap();
        assert_eq!(number, 17);
        assert_eq!(
            classify(payload),
            Outcome::DeviceError("INVALID COMMAND".to_string())
        );
    }

    #[test]
    fn utf16_round_trip_with_bom() {
        let encoded = encode_utf16le("5 response$ = _METHPATH$");
        assert_eq!(&encoded[..2], &[0xFF, 0xFE]);
        assert_eq!(
            decode_utf16(&encoded).as_deref(),
            Some("5 response$ = _METHPATH$")
        );
    }

    #[test]
    fn decode_handles_big_endian_bom_and_missing_bom() {
        let big_endian: Vec<u8> = [0xFEFFu16, 0x0031, 0x0020, 0x004F, 0x004B]
            .iter()
            .flat_map(|unit| unit.to_be_bytes())
            .collect();
        assert_eq!(decode_utf16(&big_endian).as_deref(), Some("1 OK"));

        let bare: Vec<u8> = "1 OK"
            .encode_utf16()
            .flat_map(|unit| unit.to_le_bytes())
            .collect();
        assert_eq!(decode_utf16(&bare).as_deref(), Some("1 OK"));
    }

    #[test]
    fn decode_rejects_torn_content() {
        assert_eq!(decode_utf16(&[0xFF, 0xFE, 0x31]), None);
        // Lone high surrogate.
        assert_eq!(decode_utf16(&[0xFF, 0xFE, 0x00, 0xD8]), None);
    }
}
