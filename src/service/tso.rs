use std::sync::Arc;
use std::time::Duration;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use crate::clock::allocation::AllocationEngine;
use crate::clock::overflow::OverflowGuard;
use crate::config::TsoConfig;
use crate::error::{Error, ErrorCode, Result};
use crate::leader::election::LeaderElection;
use crate::leader::gate::LeaderGate;
use crate::observability::metrics;
use crate::observability::tracing::{trace_get_timestamp, trace_get_timestamps};
use crate::types::timestamp::{HybridClock, HybridTimestamp, TsoClock};

/// Outcome of an allocation that passed the leader gate check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Grant<T> {
    Granted(T),
    NotLeader,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetTimestampResponse {
    pub timestamp: u64,
    pub is_leader: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorCode>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetTimestampsResponse {
    pub max_timestamp: u64,
    pub is_leader: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorCode>,
}

impl GetTimestampResponse {
    /// `is_leader` is the gate as seen after the request; a failure that
    /// raced with a step-down is reported as coming from a follower.
    pub fn from_result(result: Result<Grant<HybridTimestamp>>, is_leader: bool) -> Self {
        match result {
            Ok(Grant::Granted(ts)) => GetTimestampResponse { timestamp: ts.as_u64(), is_leader: true, error: None },
            Ok(Grant::NotLeader) => GetTimestampResponse { timestamp: 0, is_leader: false, error: None },
            Err(e) => GetTimestampResponse { timestamp: 0, is_leader, error: Some(e.code()) },
        }
    }
}

impl GetTimestampsResponse {
    pub fn from_result(result: Result<Grant<HybridTimestamp>>, is_leader: bool) -> Self {
        match result {
            Ok(Grant::Granted(ts)) => GetTimestampsResponse { max_timestamp: ts.as_u64(), is_leader: true, error: None },
            Ok(Grant::NotLeader) => GetTimestampsResponse { max_timestamp: 0, is_leader: false, error: None },
            Err(e) => GetTimestampsResponse { max_timestamp: 0, is_leader, error: Some(e.code()) },
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TsoStatus {
    pub is_leader: bool,
    pub timestamp: u64,
    pub clock: TsoClock,
    pub logical_bits: u32,
    pub max_batch_size: u32,
    pub recovery_in_flight: bool,
}

/// TSO Service - request surface of the oracle
///
/// Owns the clock word, the leadership flag and the overflow guard for one
/// process. Share it behind an `Arc`; every method takes `&self` and none of
/// them lock.
pub struct TsoService {
    engine: Arc<AllocationEngine>,
    gate: Arc<LeaderGate>,
    guard: OverflowGuard,
}

impl TsoService {
    /// Must be called inside a tokio runtime; the overflow guard spawns its
    /// recovery checks there.
    pub fn new(
        engine: AllocationEngine,
        election: Arc<dyn LeaderElection>,
        update_interval: Duration,
    ) -> Result<Self> {
        let engine = Arc::new(engine);
        let gate = Arc::new(LeaderGate::new(election));
        let guard = OverflowGuard::new(Arc::clone(&engine), Arc::clone(&gate), update_interval)?;

        Ok(TsoService { engine, gate, guard })
    }

    pub fn from_config(config: &TsoConfig, election: Arc<dyn LeaderElection>) -> Result<Self> {
        config.validate()?;

        let mut engine = AllocationEngine::new(config.clock()?, config.initial_physical_ms)?;
        if let Some(max) = config.max_batch_size {
            engine = engine.with_max_batch_size(max);
        }

        Self::new(engine, election, config.update_interval())
    }

    pub fn get_timestamp(&self) -> Result<Grant<HybridTimestamp>> {
        let _span = trace_get_timestamp().entered();

        if !self.gate.is_leader_now() {
            metrics::NOT_LEADER_RESPONSES.inc();
            return Ok(Grant::NotLeader);
        }

        let timer = metrics::ALLOCATION_LATENCY.start_timer();
        let allocated = self.engine.allocate_one();
        timer.observe_duration();

        let ts = allocated.or_else(|e| self.fail(e, 1))?;
        metrics::TIMESTAMPS_ISSUED.inc();
        Ok(self.confirm_leadership(ts))
    }

    /// Grants `size` consecutive timestamps and returns the largest. The
    /// caller owns `[max - (size - 1), max]` in logical units.
    pub fn get_timestamps(&self, size: u32) -> Result<Grant<HybridTimestamp>> {
        let _span = trace_get_timestamps(size).entered();

        if !self.gate.is_leader_now() {
            metrics::NOT_LEADER_RESPONSES.inc();
            return Ok(Grant::NotLeader);
        }

        let size = size.max(1);
        let timer = metrics::ALLOCATION_LATENCY.start_timer();
        let allocated = self.engine.allocate_batch(size);
        timer.observe_duration();

        let max_ts = allocated.or_else(|e| self.fail(e, size as u64))?;
        metrics::BATCH_REQUESTS.inc();
        metrics::TIMESTAMPS_ISSUED.inc_by(size as u64);
        Ok(self.confirm_leadership(max_ts))
    }

    pub fn get_timestamp_response(&self) -> GetTimestampResponse {
        let result = self.get_timestamp();
        GetTimestampResponse::from_result(result, self.gate.is_leader_now())
    }

    pub fn get_timestamps_response(&self, size: u32) -> GetTimestampsResponse {
        let result = self.get_timestamps(size);
        GetTimestampsResponse::from_result(result, self.gate.is_leader_now())
    }

    /// Driven by the wall-clock driver only.
    pub fn set_physical_time(&self, physical: u64) -> Result<()> {
        self.engine.set_physical_time(physical)?;
        metrics::PHYSICAL_TIME_UPDATES.inc();
        metrics::PHYSICAL_TIME_MS.set(physical as i64);
        Ok(())
    }

    /// Starts a leadership term with the clock seeded at `seed_physical`.
    pub fn on_leader_elected(&self, seed_physical: u64) -> Result<()> {
        self.engine.set_physical_time(seed_physical)?;
        self.gate.set_leader(true);
        metrics::IS_LEADER.set(1);
        metrics::PHYSICAL_TIME_MS.set(seed_physical as i64);
        Ok(())
    }

    /// Ends the term: stop admitting requests, then discard the clock.
    pub fn on_leader_lost(&self) {
        self.gate.set_leader(false);
        self.engine.clear();
        metrics::IS_LEADER.set(0);
    }

    pub fn is_leader(&self) -> bool {
        self.gate.is_leader_now()
    }

    pub fn current_clock(&self) -> TsoClock {
        self.engine.current_clock()
    }

    pub fn clock(&self) -> HybridClock {
        self.engine.clock()
    }

    pub fn overflow_guard(&self) -> &OverflowGuard {
        &self.guard
    }

    pub fn status(&self) -> TsoStatus {
        let ts = self.engine.current_timestamp();
        TsoStatus {
            is_leader: self.gate.is_leader_now(),
            timestamp: ts.as_u64(),
            clock: self.engine.clock().decode(ts),
            logical_bits: self.engine.clock().logical_bits(),
            max_batch_size: self.engine.max_batch_size(),
            recovery_in_flight: self.guard.is_checking(),
        }
    }

    fn fail<T>(&self, e: Error, span: u64) -> Result<T> {
        metrics::ALLOCATION_ERRORS.inc();
        warn!("Timestamp allocation failed: {}", e);

        if let Error::LogicalClockOverflow { physical, logical } = e {
            self.guard.check_logical(physical, logical, span)?;
        }

        Err(e)
    }

    /// A step-down racing with the allocation wins: the value is dropped
    /// unused rather than issued by a replica that no longer leads.
    fn confirm_leadership(&self, ts: HybridTimestamp) -> Grant<HybridTimestamp> {
        if self.gate.is_leader_now() {
            Grant::Granted(ts)
        } else {
            debug!("Leadership lost during allocation, discarding {}", ts);
            metrics::NOT_LEADER_RESPONSES.inc();
            Grant::NotLeader
        }
    }
}
