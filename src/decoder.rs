//! Occupancy decoding.
//!
//! Each sensor reading packs one occupancy bit per parking spot into an
//! integer. Spot 1 is the most significant of the `width` bits.

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::parser::Reading;

/// Number of spots encoded per reading in the deployed sensor layout.
pub const DEFAULT_BIT_WIDTH: u32 = 16;

/// Expands `value` into exactly `width` occupancy flags, most significant bit
/// first. Bits above `width` are dropped.
pub fn decode(value: u64, width: u32) -> Vec<bool> {
    if width < 64 && value >> width != 0 {
        warn!(value, width, "Encoded value wider than spot count, high bits dropped");
    }
    (0..width)
        .rev()
        .map(|bit| bit < 64 && (value >> bit) & 1 == 1)
        .collect()
}

/// Packs occupancy flags back into an integer, first flag most significant.
pub fn encode(spots: &[bool]) -> u64 {
    spots
        .iter()
        .fold(0u64, |acc, &occupied| (acc << 1) | u64::from(occupied))
}

/// Decoded per-spot state at one instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccupancySnapshot {
    pub timestamp: DateTime<Utc>,
    pub spots: Vec<bool>,
}

impl OccupancySnapshot {
    pub fn from_reading(reading: &Reading, width: u32) -> Self {
        Self {
            timestamp: reading.timestamp,
            spots: decode(reading.encoded_value, width),
        }
    }

    pub fn occupied_count(&self) -> usize {
        self.spots.iter().filter(|&&s| s).count()
    }
}

/// Decodes every reading with the same spot width.
pub fn snapshots(readings: &[Reading], width: u32) -> Vec<OccupancySnapshot> {
    readings
        .iter()
        .map(|r| OccupancySnapshot::from_reading(r, width))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_msb_first_zero_padded() {
        let spots = decode(0b101, 16);
        assert_eq!(spots.len(), 16);
        assert!(spots[13]);
        assert!(!spots[14]);
        assert!(spots[15]);
        assert_eq!(spots.iter().filter(|&&s| s).count(), 2);
    }

    #[test]
    fn test_decode_high_bit_is_first_spot() {
        let spots = decode(1 << 15, 16);
        assert!(spots[0]);
        assert!(spots[1..].iter().all(|&s| !s));
    }

    #[test]
    fn test_round_trip_within_width() {
        for v in [0u64, 1, 2, 255, 256, 4096, 43690, 65535] {
            assert_eq!(encode(&decode(v, 16)), v);
        }
        for v in 0..(1u64 << 8) {
            assert_eq!(encode(&decode(v, 8)), v);
        }
    }

    #[test]
    fn test_overflow_keeps_width() {
        let spots = decode(0x1_0001, 16);
        assert_eq!(spots.len(), 16);
        assert_eq!(encode(&spots), 1);
    }

    #[test]
    fn test_full_width_64() {
        let spots = decode(u64::MAX, 64);
        assert_eq!(spots.len(), 64);
        assert_eq!(encode(&spots), u64::MAX);
    }

    #[test]
    fn test_snapshot_occupied_count() {
        let reading = Reading {
            timestamp: Utc::now(),
            device_id: "tvbox-e10-04".into(),
            encoded_value: 0b1011,
        };
        let snap = OccupancySnapshot::from_reading(&reading, 16);
        assert_eq!(snap.occupied_count(), 3);
    }
}
