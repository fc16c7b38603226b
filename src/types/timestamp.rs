use std::fmt;
use serde::{Deserialize, Serialize};
use crate::error::{Error, Result};

/// Width of the logical counter in a deployed oracle.
///
/// Every replica and every client must agree on this value, otherwise a
/// timestamp decodes differently depending on who reads it.
pub const DEFAULT_LOGICAL_BITS: u32 = 18;

/// A packed hybrid timestamp. Ordering is plain integer ordering.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HybridTimestamp(pub u64);

impl HybridTimestamp {
    pub const ZERO: HybridTimestamp = HybridTimestamp(0);

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl From<u64> for HybridTimestamp {
    fn from(raw: u64) -> Self {
        HybridTimestamp(raw)
    }
}

impl fmt::Display for HybridTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The decoded halves of a hybrid timestamp.
///
/// Field order matters: the derived `Ord` compares `physical` first, which is
/// the same order the packed integer gives.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TsoClock {
    pub physical: u64,  // Milliseconds since epoch
    pub logical: u64,   // Sequence within the millisecond
}

impl fmt::Display for TsoClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Physical: {} | Logical: {}", self.physical, self.logical)
    }
}

/// Bit layout of a hybrid timestamp: physical milliseconds in the high bits,
/// a logical counter in the low `logical_bits` bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HybridClock {
    logical_bits: u32,
}

impl HybridClock {
    pub fn new(logical_bits: u32) -> Result<Self> {
        if logical_bits == 0 || logical_bits > 32 {
            return Err(Error::InvalidClockLayout { logical_bits });
        }
        Ok(HybridClock { logical_bits })
    }

    pub fn logical_bits(&self) -> u32 {
        self.logical_bits
    }

    pub fn max_logical(&self) -> u64 {
        1u64 << self.logical_bits
    }

    pub fn max_physical(&self) -> u64 {
        u64::MAX >> self.logical_bits
    }

    fn logical_mask(&self) -> u64 {
        self.max_logical() - 1
    }

    /// Packs `physical` and `logical`. `logical` must be below `max_logical()`.
    pub fn encode(&self, physical: u64, logical: u64) -> HybridTimestamp {
        debug_assert!(logical < self.max_logical(), "logical {} does not fit", logical);
        HybridTimestamp((physical << self.logical_bits) | logical)
    }

    pub fn decode_physical(&self, ts: HybridTimestamp) -> u64 {
        ts.0 >> self.logical_bits
    }

    pub fn decode_logical(&self, ts: HybridTimestamp) -> u64 {
        ts.0 & self.logical_mask()
    }

    pub fn decode(&self, ts: HybridTimestamp) -> TsoClock {
        TsoClock {
            physical: self.decode_physical(ts),
            logical: self.decode_logical(ts),
        }
    }
}

impl Default for HybridClock {
    fn default() -> Self {
        HybridClock { logical_bits: DEFAULT_LOGICAL_BITS }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn default_layout_matches_deployment() {
        let clock = HybridClock::default();
        assert_eq!(clock.max_logical(), 262_144);
        assert_eq!(clock.max_physical(), (1u64 << 46) - 1);
    }

    #[test]
    fn rejects_unusable_widths() {
        assert!(HybridClock::new(0).is_err());
        assert!(HybridClock::new(33).is_err());
        assert!(HybridClock::new(3).is_ok());
    }

    #[test]
    fn encodes_small_layout() {
        let clock = HybridClock::new(3).unwrap();
        let ts = clock.encode(100, 6);
        assert_eq!(ts.as_u64(), 806);
        assert_eq!(clock.decode(ts), TsoClock { physical: 100, logical: 6 });
    }

    proptest! {
        #[test]
        fn decode_inverts_encode(
            bits in 1u32..=32,
            physical in any::<u64>(),
            logical in any::<u64>(),
        ) {
            let clock = HybridClock::new(bits).unwrap();
            let physical = physical & clock.max_physical();
            let logical = logical % clock.max_logical();

            let ts = clock.encode(physical, logical);
            prop_assert_eq!(clock.decode(ts), TsoClock { physical, logical });
        }

        #[test]
        fn packed_order_is_lexicographic(
            p1 in 0u64..1_000,
            l1 in 0u64..(1 << 18),
            p2 in 0u64..1_000,
            l2 in 0u64..(1 << 18),
        ) {
            let clock = HybridClock::default();
            let a = clock.encode(p1, l1);
            let b = clock.encode(p2, l2);
            prop_assert_eq!(a.cmp(&b), (p1, l1).cmp(&(p2, l2)));
        }
    }
}
