//! Discord snowflake ids carry their creation time in the top 42 bits.

use chrono::{DateTime, Utc};

/// Milliseconds between the Unix epoch and the Discord epoch (2015-01-01).
pub const DISCORD_EPOCH_MS: u64 = 1_420_070_400_000;

/// Creation instant of a snowflake, in Unix milliseconds.
pub fn created_at_ms(id: u64) -> u64 {
    (id >> 22) + DISCORD_EPOCH_MS
}

pub fn created_at(id: u64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(i64::try_from(created_at_ms(id)).ok()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_user_id() {
        let id = 80_351_110_224_678_912;
        assert_eq!(created_at_ms(id), (id >> 22) + 1_420_070_400_000);
        assert_eq!(created_at_ms(id), 1_439_227_597_529);
        let at = created_at(id).unwrap();
        assert_eq!(at.timestamp(), 1_439_227_597);
    }

    #[test]
    fn zero_is_the_epoch() {
        assert_eq!(created_at(0).unwrap().timestamp_millis(), 1_420_070_400_000);
    }
}
