use std::sync::atomic::{AtomicU64, Ordering};
use crate::error::{Error, Result};
use crate::types::timestamp::{HybridClock, HybridTimestamp, TsoClock};

/// Allocation Engine - sole owner of the shared hybrid clock word
///
/// ## Invariants
/// - `current` is only ever replaced by `set_physical_time` (logical reset to 0)
///   or advanced by `fetch_add_logical`.
/// - A committed value never carries a logical part at or above `max_logical`.
///   The increment is a CAS loop that checks the candidate before committing,
///   so an exhausted millisecond is reported instead of spilling into the
///   physical bits.
/// - An unprimed clock (physical 0) is never advanced.
pub struct AllocationEngine {
    clock: HybridClock,
    current: AtomicU64,
    max_batch_size: u32,
}

impl AllocationEngine {
    /// Creates an engine seeded with `initial_physical` and logical 0.
    ///
    /// Pass 0 to start unprimed; allocations then fail with
    /// `TimestampNotFound` until the first `set_physical_time`.
    pub fn new(clock: HybridClock, initial_physical: u64) -> Result<Self> {
        if initial_physical > clock.max_physical() {
            return Err(Error::PhysicalTimeOutOfRange {
                physical: initial_physical,
                max: clock.max_physical(),
            });
        }

        Ok(AllocationEngine {
            clock,
            current: AtomicU64::new(clock.encode(initial_physical, 0).as_u64()),
            max_batch_size: Self::default_max_batch_size(&clock),
        })
    }

    /// One eighth of the logical space, so a single batch cannot exhaust a
    /// millisecond on its own.
    pub fn default_max_batch_size(clock: &HybridClock) -> u32 {
        (clock.max_logical() / 8).min(u32::MAX as u64) as u32
    }

    pub fn with_max_batch_size(mut self, max_batch_size: u32) -> Self {
        let ceiling = (self.clock.max_logical() - 1).min(u32::MAX as u64) as u32;
        self.max_batch_size = max_batch_size.min(ceiling);
        self
    }

    pub fn clock(&self) -> HybridClock {
        self.clock
    }

    pub fn max_batch_size(&self) -> u32 {
        self.max_batch_size
    }

    /// Replaces the whole word with `(physical, 0)` in a single store.
    ///
    /// Physical and logical must change together: if a reader could see the
    /// new physical part paired with the old logical part, the next reset to
    /// logical 0 would hand out a smaller timestamp than one already issued.
    pub fn set_physical_time(&self, physical: u64) -> Result<()> {
        if physical > self.clock.max_physical() {
            return Err(Error::PhysicalTimeOutOfRange {
                physical,
                max: self.clock.max_physical(),
            });
        }

        let next = self.clock.encode(physical, 0);
        let previous = HybridTimestamp(self.current.swap(next.as_u64(), Ordering::AcqRel));

        let previous_physical = self.clock.decode_physical(previous);
        if physical < previous_physical {
            tracing::warn!(
                "Physical time moved backwards: previous={}, new={}",
                previous_physical,
                physical
            );
        }

        Ok(())
    }

    /// Advances the logical counter by `n` and returns the value before the
    /// increment.
    pub fn fetch_add_logical(&self, n: u32) -> Result<HybridTimestamp> {
        let n = n as u64;
        let mut observed = self.current.load(Ordering::Acquire);

        loop {
            let base = HybridTimestamp(observed);
            let physical = self.clock.decode_physical(base);
            if physical == 0 {
                return Err(Error::TimestampNotFound);
            }

            let next_logical = self.clock.decode_logical(base) + n;
            if next_logical >= self.clock.max_logical() {
                return Err(Error::LogicalClockOverflow {
                    physical,
                    logical: next_logical,
                });
            }

            match self.current.compare_exchange_weak(
                observed,
                observed + n,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Ok(base),
                Err(actual) => observed = actual,
            }
        }
    }

    pub fn allocate_one(&self) -> Result<HybridTimestamp> {
        self.fetch_add_logical(1)
    }

    /// Grants `size` consecutive timestamps sharing one physical value and
    /// returns the largest of them. A size of 0 is treated as 1.
    pub fn allocate_batch(&self, size: u32) -> Result<HybridTimestamp> {
        let size = size.max(1);
        if size > self.max_batch_size {
            return Err(Error::BatchTooLarge {
                requested: size,
                max: self.max_batch_size,
            });
        }

        let base = self.fetch_add_logical(size)?;
        let physical = self.clock.decode_physical(base);
        let logical = self.clock.decode_logical(base) + size as u64 - 1;

        Ok(self.clock.encode(physical, logical))
    }

    pub fn current_timestamp(&self) -> HybridTimestamp {
        HybridTimestamp(self.current.load(Ordering::Acquire))
    }

    pub fn current_clock(&self) -> TsoClock {
        self.clock.decode(self.current_timestamp())
    }

    /// Discards the clock state. Used when this replica stops leading.
    pub fn clear(&self) {
        self.current.store(0, Ordering::Release);
    }
}
