//! Snapshot wire format.
//!
//! Each slot holds one serialized snapshot of a namespace's full mapping:
//!
//! ```text
//! magic|generation|count|entries|crc32
//!
//! u32 magic      = format marker, 0xB32C41B4
//! u32 generation = iterated for each write to the namespace
//! u32 count      = number of entries
//! entries        = repeated: key_len|value_len|key|value (u32 lengths)
//! u32 crc32      = digest over all preceding bytes
//! ```
//!
//! All integer fields are little-endian. Keys and values are UTF-8 and not
//! null terminated.

use std::collections::BTreeMap;

use crate::error::NvramError;

/// In-memory form of one namespace's mapping. Ordered so that listings are
/// deterministic for a given on-disk state.
pub type Entries = BTreeMap<String, String>;

/// Format marker at the start of every snapshot.
pub const MAGIC: u32 = 0xB32C41B4;

const HEADER_SIZE: usize = 12;
const ENTRY_HEADER_SIZE: usize = 8;
const CRC_SIZE: usize = 4;

/// Serialize a snapshot. Infallible: entry text is validated before it ever
/// reaches the codec.
pub fn encode(generation: u32, entries: &Entries) -> Vec<u8> {
    let payload: usize = entries
        .iter()
        .map(|(k, v)| ENTRY_HEADER_SIZE + k.len() + v.len())
        .sum();
    let mut buf = Vec::with_capacity(HEADER_SIZE + payload + CRC_SIZE);

    buf.extend_from_slice(&MAGIC.to_le_bytes());
    buf.extend_from_slice(&generation.to_le_bytes());
    buf.extend_from_slice(&(entries.len() as u32).to_le_bytes());
    for (key, value) in entries {
        buf.extend_from_slice(&(key.len() as u32).to_le_bytes());
        buf.extend_from_slice(&(value.len() as u32).to_le_bytes());
        buf.extend_from_slice(key.as_bytes());
        buf.extend_from_slice(value.as_bytes());
    }
    let crc = crc32fast::hash(&buf);
    buf.extend_from_slice(&crc.to_le_bytes());

    buf
}

/// Parse a snapshot buffer back into `(generation, entries)`.
///
/// Empty input is the "namespace never written" state and decodes to
/// generation 0 with an empty mapping. Everything else that does not frame
/// correctly is `Corruption`.
pub fn decode(bytes: &[u8]) -> Result<(u32, Entries), NvramError> {
    if bytes.is_empty() {
        return Ok((0, Entries::new()));
    }
    if bytes.len() < HEADER_SIZE + CRC_SIZE {
        return Err(corrupt("snapshot shorter than header"));
    }

    let magic = read_u32(bytes, 0);
    if magic != MAGIC {
        return Err(corrupt(format!("bad format marker 0x{magic:08x}")));
    }

    let body_len = bytes.len() - CRC_SIZE;
    let declared_crc = read_u32(bytes, body_len);
    let actual_crc = crc32fast::hash(&bytes[..body_len]);
    if declared_crc != actual_crc {
        return Err(corrupt(format!(
            "crc32 mismatch: 0x{actual_crc:08x} != 0x{declared_crc:08x}"
        )));
    }

    let generation = read_u32(bytes, 4);
    let count = read_u32(bytes, 8) as usize;

    let mut entries = Entries::new();
    let mut at = HEADER_SIZE;
    for _ in 0..count {
        if body_len - at < ENTRY_HEADER_SIZE {
            return Err(corrupt("entry header past end of snapshot"));
        }
        let key_len = read_u32(bytes, at) as usize;
        let value_len = read_u32(bytes, at + 4) as usize;
        at += ENTRY_HEADER_SIZE;

        let remaining = body_len - at;
        if key_len > remaining || value_len > remaining - key_len {
            return Err(corrupt("entry length longer than snapshot"));
        }
        let key = std::str::from_utf8(&bytes[at..at + key_len])
            .map_err(|_| corrupt("key is not valid utf-8"))?;
        let value = std::str::from_utf8(&bytes[at + key_len..at + key_len + value_len])
            .map_err(|_| corrupt("value is not valid utf-8"))?;
        at += key_len + value_len;

        entries.insert(key.to_string(), value.to_string());
    }
    if at != body_len {
        return Err(corrupt("trailing bytes after last entry"));
    }

    Ok((generation, entries))
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    let mut field = [0u8; 4];
    field.copy_from_slice(&bytes[at..at + 4]);
    u32::from_le_bytes(field)
}

fn corrupt(reason: impl Into<String>) -> NvramError {
    NvramError::Corruption {
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Entries {
        Entries::from([
            ("bootcount".to_string(), "3".to_string()),
            ("serial".to_string(), "X100-42".to_string()),
        ])
    }

    #[test]
    fn round_trip() {
        let buf = encode(7, &sample());
        let (generation, entries) = decode(&buf).unwrap();
        assert_eq!(generation, 7);
        assert_eq!(entries, sample());
    }

    #[test]
    fn empty_input_is_never_written() {
        let (generation, entries) = decode(&[]).unwrap();
        assert_eq!(generation, 0);
        assert!(entries.is_empty());
    }

    #[test]
    fn empty_mapping_round_trips() {
        let buf = encode(1, &Entries::new());
        let (generation, entries) = decode(&buf).unwrap();
        assert_eq!(generation, 1);
        assert!(entries.is_empty());
    }

    #[test]
    fn rejects_bad_magic() {
        let mut buf = encode(1, &sample());
        buf[0] ^= 0xff;
        assert!(matches!(
            decode(&buf),
            Err(NvramError::Corruption { reason }) if reason.contains("format marker")
        ));
    }

    #[test]
    fn rejects_flipped_payload_byte() {
        let mut buf = encode(1, &sample());
        let mid = buf.len() / 2;
        buf[mid] ^= 0x01;
        assert!(matches!(
            decode(&buf),
            Err(NvramError::Corruption { reason }) if reason.contains("crc32")
        ));
    }

    #[test]
    fn rejects_truncated_snapshot() {
        let buf = encode(1, &sample());
        assert!(decode(&buf[..buf.len() - 5]).is_err());
        assert!(decode(&buf[..HEADER_SIZE - 1]).is_err());
    }

    #[test]
    fn rejects_entry_overrunning_buffer() {
        // Declare a key longer than the snapshot body, with a valid crc so
        // only the length check can catch it.
        let mut buf = Vec::new();
        buf.extend_from_slice(&MAGIC.to_le_bytes());
        buf.extend_from_slice(&1u32.to_le_bytes());
        buf.extend_from_slice(&1u32.to_le_bytes());
        buf.extend_from_slice(&1000u32.to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes());
        buf.extend_from_slice(b"ab");
        let crc = crc32fast::hash(&buf);
        buf.extend_from_slice(&crc.to_le_bytes());

        assert!(matches!(
            decode(&buf),
            Err(NvramError::Corruption { reason }) if reason.contains("length")
        ));
    }

    #[test]
    fn rejects_trailing_bytes() {
        // One entry declared, extra byte between it and the checksum.
        let entry = ("k".to_string(), "v".to_string());
        let mut buf = Vec::new();
        buf.extend_from_slice(&MAGIC.to_le_bytes());
        buf.extend_from_slice(&1u32.to_le_bytes());
        buf.extend_from_slice(&1u32.to_le_bytes());
        buf.extend_from_slice(&(entry.0.len() as u32).to_le_bytes());
        buf.extend_from_slice(&(entry.1.len() as u32).to_le_bytes());
        buf.extend_from_slice(entry.0.as_bytes());
        buf.extend_from_slice(entry.1.as_bytes());
        buf.push(0);
        let crc = crc32fast::hash(&buf);
        buf.extend_from_slice(&crc.to_le_bytes());

        assert!(matches!(
            decode(&buf),
            Err(NvramError::Corruption { reason }) if reason.contains("trailing")
        ));
    }

    #[test]
    fn generation_is_preserved() {
        let buf = encode(u32::MAX, &Entries::new());
        let (generation, _) = decode(&buf).unwrap();
        assert_eq!(generation, u32::MAX);
    }
}
