//! History purges.
//!
//! Pagination is strictly sequential: one page is fetched, its qualifying
//! events are redacted concurrently, then the next page is requested. A walk
//! ends when the count budget is spent, the continuation token is missing or
//! stops changing, or (for reply-anchored purges) the invoking command event
//! is reached.

use super::redact::RedactionWorker;
use super::{BulkActionJob, Capability, Moderator};
use crate::client::ActionClient;
use crate::error::{CommandResult, ModerationError};
use slmod_proto::{Direction, Event, EventId, RoomEventFilter, RoomId, UserId};
use tracing::{debug, info};

/// What a purge command asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PurgeRequest {
    /// The newest `n` qualifying events.
    Count(usize),
    /// Events sent by `user`, optionally only the newest `limit`.
    User { user: UserId, limit: Option<usize> },
}

impl PurgeRequest {
    pub fn parse(args: &[&str]) -> Result<Self, ModerationError> {
        let usage =
            || ModerationError::InvalidTarget("Usage: purge <count> | purge <@user> [count]".into());
        let count = |raw: &str| match raw.parse::<usize>() {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(ModerationError::InvalidTarget(format!(
                "{raw} is not a valid number of messages"
            ))),
        };

        match args {
            [first] if first.starts_with('@') => Ok(PurgeRequest::User {
                user: parse_user(first)?,
                limit: None,
            }),
            [first, n] if first.starts_with('@') => Ok(PurgeRequest::User {
                user: parse_user(first)?,
                limit: Some(count(n)?),
            }),
            [n] => Ok(PurgeRequest::Count(count(n)?)),
            _ => Err(usage()),
        }
    }

    fn filter(&self) -> RoomEventFilter {
        match self {
            PurgeRequest::Count(_) => RoomEventFilter::purge(),
            PurgeRequest::User { user, .. } => RoomEventFilter::purge().with_sender(user.clone()),
        }
    }

    fn limit(&self) -> Option<usize> {
        match self {
            PurgeRequest::Count(n) => Some(*n),
            PurgeRequest::User { limit, .. } => *limit,
        }
    }

    fn sender(&self) -> Option<&UserId> {
        match self {
            PurgeRequest::Count(_) => None,
            PurgeRequest::User { user, .. } => Some(user),
        }
    }
}

fn parse_user(raw: &str) -> Result<UserId, ModerationError> {
    UserId::parse(raw).map_err(|_| ModerationError::InvalidTarget(format!("{raw} is not a user")))
}

/// Position in a room's history.
#[derive(Debug, Clone)]
pub struct PurgeCursor {
    filter: RoomEventFilter,
    token: Option<String>,
    direction: Direction,
    remaining: Option<usize>,
    exhausted: bool,
}

impl PurgeCursor {
    /// Walk backward from the newest event.
    pub fn backward(filter: RoomEventFilter, remaining: Option<usize>) -> Self {
        Self {
            filter,
            token: None,
            direction: Direction::Backward,
            remaining,
            exhausted: false,
        }
    }

    /// Walk forward from `token`.
    pub fn forward(filter: RoomEventFilter, token: String) -> Self {
        Self {
            filter,
            token: Some(token),
            direction: Direction::Forward,
            remaining: None,
            exhausted: false,
        }
    }

    /// Fetch the next page.
    ///
    /// Returns [`ModerationError::LogExhausted`] once the previous page came
    /// back without a token or with the token it was requested from.
    pub async fn next_page(
        &mut self,
        client: &dyn ActionClient,
        room: &RoomId,
        page_size: usize,
    ) -> Result<Vec<Event>, ModerationError> {
        if self.exhausted {
            return Err(ModerationError::LogExhausted);
        }

        let from = self.token.take();
        let page = client
            .messages(room, from.as_deref(), self.direction, &self.filter, page_size)
            .await?;

        match page.end {
            Some(end) if from.as_deref() != Some(end.as_str()) => self.token = Some(end),
            _ => {
                debug!(room = %room, "history exhausted");
                self.exhausted = true;
            }
        }
        Ok(page.chunk)
    }

    /// Spend one unit of the count budget. `false` once it is spent.
    pub fn take(&mut self) -> bool {
        match &mut self.remaining {
            None => true,
            Some(0) => false,
            Some(n) => {
                *n -= 1;
                true
            }
        }
    }

    /// Whether the count budget is spent.
    pub fn is_done(&self) -> bool {
        self.remaining == Some(0)
    }
}

/// Totals for a finished purge.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PurgeOutcome {
    pub redacted: usize,
    pub failed: usize,
    pub pages: usize,
}

impl PurgeOutcome {
    fn record(&mut self, attempted: usize, succeeded: usize) {
        self.redacted += succeeded;
        self.failed += attempted - succeeded;
    }

    pub fn summary(&self) -> String {
        let noun = if self.redacted == 1 { "message" } else { "messages" };
        if self.failed == 0 {
            format!("Purged {} {noun}.", self.redacted)
        } else {
            format!("Purged {} {noun}, {} failed.", self.redacted, self.failed)
        }
    }
}

/// Shared machinery for one purge walk. The worker only lives as long as
/// the walk; events redacted by earlier purges carry `redacted_because`.
struct Purge<'a> {
    client: &'a dyn ActionClient,
    job: &'a BulkActionJob,
    worker: RedactionWorker,
    room: &'a RoomId,
    page_size: usize,
}

impl Purge<'_> {
    async fn redact(&self, batch: &[Event], outcome: &mut PurgeOutcome) {
        if batch.is_empty() {
            return;
        }
        let succeeded = self
            .worker
            .redact_all(self.job, self.client, self.room, batch)
            .await;
        outcome.record(batch.len(), succeeded);
    }

    /// Backward walk, newest first, skipping `skip`.
    async fn history(
        &self,
        request: &PurgeRequest,
        skip: Option<&EventId>,
    ) -> Result<PurgeOutcome, ModerationError> {
        let mut cursor = PurgeCursor::backward(request.filter(), request.limit());
        let mut outcome = PurgeOutcome::default();

        while !cursor.is_done() {
            let page = match cursor.next_page(self.client, self.room, self.page_size).await {
                Ok(page) => page,
                Err(ModerationError::LogExhausted) => break,
                Err(e) => return Err(e),
            };
            outcome.pages += 1;

            let mut batch = Vec::new();
            for event in page {
                if Some(&event.event_id) == skip || !RedactionWorker::is_redactable(&event) {
                    continue;
                }
                if request.sender().is_some_and(|user| &event.sender != user) {
                    continue;
                }
                if !cursor.take() {
                    break;
                }
                batch.push(event);
            }
            self.redact(&batch, &mut outcome).await;
        }
        Ok(outcome)
    }

    /// Forward walk from `anchor` up to, not including, `sentinel`.
    async fn from_anchor(
        &self,
        anchor: &EventId,
        sentinel: Option<&EventId>,
        context_size: usize,
    ) -> Result<PurgeOutcome, ModerationError> {
        let filter = RoomEventFilter::purge();
        let context = self
            .client
            .context(self.room, anchor, &filter, context_size)
            .await?;
        let anchor_event = context.event.ok_or_else(|| {
            ModerationError::InvalidTarget("The replied-to message was not found.".into())
        })?;

        let mut outcome = PurgeOutcome::default();
        let mut reached = false;
        let mut batch = vec![anchor_event];
        for event in context.events_after {
            if Some(&event.event_id) == sentinel {
                reached = true;
                break;
            }
            batch.push(event);
        }
        self.redact(&batch, &mut outcome).await;

        let Some(token) = context.end else {
            return Ok(outcome);
        };
        let mut cursor = PurgeCursor::forward(filter, token);

        while !reached {
            let page = match cursor.next_page(self.client, self.room, self.page_size).await {
                Ok(page) => page,
                Err(ModerationError::LogExhausted) => break,
                Err(e) => return Err(e),
            };
            outcome.pages += 1;

            let mut batch = Vec::new();
            for event in page {
                if Some(&event.event_id) == sentinel {
                    reached = true;
                    break;
                }
                batch.push(event);
            }
            self.redact(&batch, &mut outcome).await;
        }
        Ok(outcome)
    }
}

impl Moderator {
    fn purge_walk<'a>(&'a self, room: &'a RoomId) -> Purge<'a> {
        Purge {
            client: self.client(),
            job: &self.job,
            worker: RedactionWorker::new(),
            room,
            page_size: self.limits.page_size,
        }
    }

    /// Redact recent history. `command` is the invoking event, which is
    /// neither redacted nor counted.
    pub async fn purge(
        &self,
        room: &RoomId,
        actor: &UserId,
        command: Option<&EventId>,
        request: PurgeRequest,
    ) -> CommandResult {
        let power = self.authorized_power(room, actor).await?;
        self.require_self(&power, &Capability::Redact)?;

        let outcome = self.purge_walk(room).history(&request, command).await?;
        info!(
            actor = %actor,
            room = %room,
            redacted = outcome.redacted,
            failed = outcome.failed,
            pages = outcome.pages,
            "history purged"
        );
        Ok(outcome.summary())
    }

    /// Redact the replied-to event and everything after it, stopping at the
    /// invoking command event, which is left in place.
    pub async fn purge_from_reply(
        &self,
        room: &RoomId,
        actor: &UserId,
        command: Option<&EventId>,
        reply_to: Option<&EventId>,
    ) -> CommandResult {
        let anchor = reply_to.ok_or_else(|| {
            ModerationError::InvalidTarget("Reply to the message you want to purge from.".into())
        })?;
        let power = self.authorized_power(room, actor).await?;
        self.require_self(&power, &Capability::Redact)?;

        let outcome = self
            .purge_walk(room)
            .from_anchor(anchor, command, self.limits.context_size)
            .await?;
        info!(
            actor = %actor,
            room = %room,
            anchor = %anchor,
            redacted = outcome.redacted,
            failed = outcome.failed,
            "history purged from anchor"
        );
        Ok(outcome.summary())
    }

    /// Purge triggered by a command message: reply-anchored when the
    /// message replies to something, otherwise by `request`.
    pub async fn purge_command(
        &self,
        room: &RoomId,
        actor: &UserId,
        command: &Event,
        request: Option<PurgeRequest>,
    ) -> CommandResult {
        match request {
            Some(request) => self.purge(room, actor, Some(&command.event_id), request).await,
            None => {
                let reply_to = command.reply_to();
                self.purge_from_reply(room, actor, Some(&command.event_id), reply_to.as_ref())
                    .await
            }
        }
    }
}
