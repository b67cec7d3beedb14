/*!
 * Telemetry
 * DLP file-open event shape and the fire-and-forget emitter
 */

use crate::core::errors::ServiceError;
use crate::core::limits::TELEMETRY_DOMAIN;
use crate::core::types::{AppIndex, SandboxKey, UserId};
use async_trait::async_trait;
use serde::{Serialize, Serializer};
use serde_with::{serde_as, TimestampMilliSeconds};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{info, warn};

/// Event name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EventName {
    #[serde(rename = "DLP_FILE_OPEN")]
    FileOpen,
    #[serde(rename = "DLP_FILE_OPEN_EVENT")]
    FileOpenEvent,
}

/// Event kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    Fault,
    Behavior,
}

/// Event codes; numeric values are consumed by downstream analytics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum EventCode {
    FileParseError = 103,
    InstallSandboxError = 104,
    StartSandboxError = 105,
    InstallSandboxSuccess = 202,
    StartSandboxSuccess = 203,
}

impl EventCode {
    #[inline]
    pub fn code(self) -> u32 {
        self as u32
    }

    #[inline]
    pub fn is_fault(self) -> bool {
        matches!(
            self,
            EventCode::FileParseError | EventCode::InstallSandboxError | EventCode::StartSandboxError
        )
    }
}

impl Serialize for EventCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.code())
    }
}

/// Event parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventParams {
    #[serde(rename = "CODE")]
    pub code: EventCode,
    #[serde(rename = "USER_ID")]
    pub user_id: UserId,
    #[serde(rename = "SANDBOX_PKGNAME")]
    pub sandbox_bundle: String,
    #[serde(rename = "SANDBOX_INDEX", skip_serializing_if = "Option::is_none")]
    pub sandbox_index: Option<AppIndex>,
    #[serde(rename = "REASON", skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// One telemetry record
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TelemetryEvent {
    pub domain: &'static str,
    pub name: EventName,
    #[serde(rename = "event_type")]
    pub kind: EventKind,
    pub params: EventParams,
    #[serde_as(as = "TimestampMilliSeconds<i64>")]
    pub emitted_at: SystemTime,
}

impl TelemetryEvent {
    /// Fault record (`DLP_FILE_OPEN`)
    pub fn fault(
        code: EventCode,
        user_id: UserId,
        sandbox_bundle: impl Into<String>,
        sandbox_index: Option<AppIndex>,
        reason: Option<String>,
    ) -> Self {
        Self {
            domain: TELEMETRY_DOMAIN,
            name: EventName::FileOpen,
            kind: EventKind::Fault,
            params: EventParams {
                code,
                user_id,
                sandbox_bundle: sandbox_bundle.into(),
                sandbox_index,
                reason,
            },
            emitted_at: SystemTime::now(),
        }
    }

    /// Behavior record (`DLP_FILE_OPEN_EVENT`)
    pub fn behavior(code: EventCode, user_id: UserId, key: &SandboxKey) -> Self {
        Self {
            domain: TELEMETRY_DOMAIN,
            name: EventName::FileOpenEvent,
            kind: EventKind::Behavior,
            params: EventParams {
                code,
                user_id,
                sandbox_bundle: key.bundle_name.clone(),
                sandbox_index: Some(key.app_index),
                reason: None,
            },
            emitted_at: SystemTime::now(),
        }
    }

    #[inline]
    pub fn code(&self) -> EventCode {
        self.params.code
    }

    #[inline]
    pub fn is_fault(&self) -> bool {
        self.kind == EventKind::Fault
    }
}

/// Telemetry transport
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    async fn emit(&self, event: TelemetryEvent) -> Result<(), ServiceError>;
}

/// Fire-and-forget emitter: sink failures are logged, never propagated
#[derive(Clone)]
pub struct Telemetry {
    sink: Arc<dyn TelemetrySink>,
}

impl Telemetry {
    pub fn new(sink: Arc<dyn TelemetrySink>) -> Self {
        Self { sink }
    }

    pub async fn emit(&self, event: TelemetryEvent) {
        let code = event.code().code();
        if let Err(e) = self.sink.emit(event).await {
            warn!(code, error = %e, "telemetry emit failed");
        }
    }
}

impl std::fmt::Debug for Telemetry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Telemetry").finish_non_exhaustive()
    }
}

/// Sink writing each event as a structured tracing record
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

#[async_trait]
impl TelemetrySink for TracingSink {
    async fn emit(&self, event: TelemetryEvent) -> Result<(), ServiceError> {
        let json = serde_json::to_string(&event)
            .map_err(|e| ServiceError::new(-1, format!("telemetry serialization: {}", e)))?;
        info!(target: "dlp_telemetry", code = event.code().code(), event = %json, "telemetry");
        Ok(())
    }
}
