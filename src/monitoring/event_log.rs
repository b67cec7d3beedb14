/*!
 * Telemetry Event Log
 * Bounded in-memory sink for inspecting recent telemetry
 */

use super::telemetry::{EventCode, TelemetryEvent, TelemetrySink};
use crate::core::errors::ServiceError;
use crate::core::limits::MAX_TELEMETRY_EVENTS;
use ahash::RandomState;
use async_trait::async_trait;
use dashmap::DashMap;
use serde::Serialize;
use std::collections::VecDeque;

/// Ring buffer of recent telemetry events with per-code counters
pub struct EventLog {
    events: parking_lot::RwLock<VecDeque<TelemetryEvent>>,
    capacity: usize,
    code_counts: DashMap<EventCode, u64, RandomState>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::with_capacity(MAX_TELEMETRY_EVENTS)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: parking_lot::RwLock::new(VecDeque::with_capacity(capacity)),
            capacity,
            code_counts: DashMap::with_hasher(RandomState::new()),
        }
    }

    /// Record one event
    pub fn record(&self, event: TelemetryEvent) {
        self.code_counts
            .entry(event.code())
            .and_modify(|count| *count += 1)
            .or_insert(1);

        let mut events = self.events.write();
        if events.len() >= self.capacity {
            events.pop_front();
        }
        events.push_back(event);
    }

    /// Most recent events, newest first
    pub fn recent(&self, limit: usize) -> Vec<TelemetryEvent> {
        let events = self.events.read();
        events.iter().rev().take(limit).cloned().collect()
    }

    /// All retained events, oldest first
    pub fn snapshot(&self) -> Vec<TelemetryEvent> {
        self.events.read().iter().cloned().collect()
    }

    /// Events recorded with a code, including evicted ones
    pub fn count(&self, code: EventCode) -> u64 {
        self.code_counts.get(&code).map(|e| *e).unwrap_or(0)
    }

    pub fn faults(&self) -> Vec<TelemetryEvent> {
        self.events
            .read()
            .iter()
            .filter(|event| event.is_fault())
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.events.write().clear();
        self.code_counts.clear();
    }

    pub fn stats(&self) -> EventLogStats {
        let events = self.events.read();
        EventLogStats {
            retained: events.len(),
            faults: events.iter().filter(|event| event.is_fault()).count(),
            total_recorded: self.code_counts.iter().map(|e| *e.value()).sum(),
        }
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLog")
            .field("capacity", &self.capacity)
            .field("retained", &self.events.read().len())
            .finish()
    }
}

#[async_trait]
impl TelemetrySink for EventLog {
    async fn emit(&self, event: TelemetryEvent) -> Result<(), ServiceError> {
        self.record(event);
        Ok(())
    }
}

/// Event log statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventLogStats {
    pub retained: usize,
    pub faults: usize,
    pub total_recorded: u64,
}
