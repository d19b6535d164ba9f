use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::ids::BookingId;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditCategory {
    Pricing,
    Fx,
    Settlement,
    Trace,
    Security,
    System,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditOutcome {
    Success,
    Rejected,
    Failed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: String,
    pub tenant_id: String,
    pub booking_id: Option<BookingId>,
    pub correlation_id: String,
    pub event_type: String,
    pub category: AuditCategory,
    pub actor: String,
    pub outcome: AuditOutcome,
    pub metadata: BTreeMap<String, String>,
    pub occurred_at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(
        tenant_id: impl Into<String>,
        booking_id: Option<BookingId>,
        correlation_id: impl Into<String>,
        event_type: impl Into<String>,
        category: AuditCategory,
        actor: impl Into<String>,
        outcome: AuditOutcome,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.into(),
            booking_id,
            correlation_id: correlation_id.into(),
            event_type: event_type.into(),
            category,
            actor: actor.into(),
            outcome,
            metadata: BTreeMap::new(),
            occurred_at: Utc::now(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

pub trait AuditSink: Send + Sync {
    fn emit(&self, event: AuditEvent);
}

#[derive(Clone, Default)]
pub struct InMemoryAuditSink {
    events: Arc<Mutex<Vec<AuditEvent>>>,
}

impl InMemoryAuditSink {
    pub fn events(&self) -> Vec<AuditEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl AuditSink for InMemoryAuditSink {
    fn emit(&self, event: AuditEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}

/// Runtime sink backed by structured tracing. Security rejections are
/// emitted at warn level so they can be routed to review separately.
#[derive(Clone, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn emit(&self, event: AuditEvent) {
        let booking_id = event.booking_id.as_ref().map(|id| id.0.as_str()).unwrap_or("unknown");
        match (&event.category, &event.outcome) {
            (AuditCategory::Security, _) | (_, AuditOutcome::Rejected | AuditOutcome::Failed) => {
                tracing::warn!(
                    event_name = %event.event_type,
                    tenant_id = %event.tenant_id,
                    booking_id = %booking_id,
                    correlation_id = %event.correlation_id,
                    actor = %event.actor,
                    outcome = ?event.outcome,
                    "audit event"
                );
            }
            _ => {
                tracing::info!(
                    event_name = %event.event_type,
                    tenant_id = %event.tenant_id,
                    booking_id = %booking_id,
                    correlation_id = %event.correlation_id,
                    actor = %event.actor,
                    outcome = ?event.outcome,
                    "audit event"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink};
    use crate::domain::ids::BookingId;

    #[test]
    fn in_memory_sink_records_events_with_correlation_fields() {
        let sink = InMemoryAuditSink::default();
        sink.emit(
            AuditEvent::new(
                "org-1",
                Some(BookingId("bk-0042".to_owned())),
                "req-123",
                "settlement.entry_posted",
                AuditCategory::Settlement,
                "confirmation-service",
                AuditOutcome::Success,
            )
            .with_metadata("direction", "original")
            .with_metadata("month", "2026-09"),
        );

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].correlation_id, "req-123");
        assert_eq!(events[0].tenant_id, "org-1");
        assert_eq!(events[0].booking_id.as_ref().map(|id| id.0.as_str()), Some("bk-0042"));
        assert!(events[0].metadata.contains_key("direction"));
    }
}
