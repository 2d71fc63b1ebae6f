//! Key encoding for the queue collection.
//!
//! A key is an 8 digit UTC date (`YYYYMMDD`) followed by the store sequence
//! zero padded to 11 digits. Both parts are fixed width, so byte order of
//! keys equals arrival order as long as the sequence keeps growing, which the
//! store guarantees across reopen.

use chrono::{DateTime, Utc};

pub const SEQUENCE_WIDTH: usize = 11;
pub const KEY_LEN: usize = 8 + SEQUENCE_WIDTH;

pub fn encode_key(time: DateTime<Utc>, sequence: u64) -> String {
    format!("{}{:0width$}", time.format("%Y%m%d"), sequence, width = SEQUENCE_WIDTH)
}

/// Recover the sequence number from a key produced by [`encode_key`].
pub fn decode_sequence(key: &str) -> Option<u64> {
    if key.len() != KEY_LEN {
        return None;
    }
    key.get(8..)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn key_is_date_then_padded_sequence() {
        let time = Utc.with_ymd_and_hms(2024, 3, 9, 23, 59, 59).unwrap();
        assert_eq!(encode_key(time, 42), "2024030900000000042");
        assert_eq!(encode_key(time, 42).len(), KEY_LEN);
    }

    #[test]
    fn keys_sort_in_sequence_order() {
        let time = Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 1).unwrap();

        let a = encode_key(time, 9);
        let b = encode_key(time, 10);
        let c = encode_key(later, 11);
        let d = encode_key(later, 1_000_000);
        assert!(a < b, "padding keeps 9 before 10");
        assert!(b < c);
        assert!(c < d);
    }

    #[test]
    fn sequence_survives_round_trip() {
        let time = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(decode_sequence(&encode_key(time, 123_456)), Some(123_456));
        assert_eq!(decode_sequence("garbage"), None);
    }
}
