//! Idempotent single-event redaction.

use crate::client::{ActionClient, ClientError};
use crate::moderation::bulk::BulkActionJob;
use dashmap::DashSet;
use slmod_proto::{Event, EventId, RoomId};
use tracing::{debug, warn};

/// Redacts events, remembering which ones it already handled.
#[derive(Debug, Default)]
pub struct RedactionWorker {
    done: DashSet<EventId>,
}

impl RedactionWorker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether this event needs a redaction call at all.
    pub fn is_redactable(event: &Event) -> bool {
        !(event.is_state() || event.is_redaction() || event.is_redacted())
    }

    /// Redact one event. State events, redactions, already redacted events
    /// and events this worker already handled succeed without a call.
    pub async fn redact(
        &self,
        client: &dyn ActionClient,
        room: &RoomId,
        event: &Event,
    ) -> Result<(), ClientError> {
        if !Self::is_redactable(event) {
            return Ok(());
        }
        if !self.done.insert(event.event_id.clone()) {
            debug!(event = %event.event_id, "already redacted");
            return Ok(());
        }

        if let Err(e) = client.redact(room, &event.event_id).await {
            self.done.remove(&event.event_id);
            warn!(room = %room, event = %event.event_id, error = %e, "redaction failed");
            return Err(e);
        }
        Ok(())
    }

    /// Redact a page of events concurrently. Returns how many succeeded.
    pub async fn redact_all(
        &self,
        job: &BulkActionJob,
        client: &dyn ActionClient,
        room: &RoomId,
        events: &[Event],
    ) -> usize {
        let results = job
            .for_each(events, |event| {
                job.gated(async move { self.redact(client, room, event).await })
            })
            .await;
        results.iter().filter(|r| r.is_ok()).count()
    }
}
