// Ordered delivery of composite events to the debugger
//
// The demux loop hands over raw packets in arrival order; this channel
// decodes them at the negotiated ID widths, applies each set's suspend
// policy to the shared tracker, and buffers sets that a caller waiting for
// a specific kind is not interested in. Buffered sets are replayed first,
// so arrival order is never lost and no event is ever dropped.

use crate::commands::event_kinds;
use crate::events::{EventKind, EventSet};
use crate::protocol::{EventPacket, JdwpError, JdwpResult};
use crate::suspend::SuspendTracker;
use crate::types::IdSizes;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::time::Instant;
use tracing::debug;

pub struct EventChannel {
    raw: mpsc::UnboundedReceiver<EventPacket>,
    buffered: VecDeque<EventSet>,
    id_sizes: IdSizes,
    suspend: Arc<Mutex<SuspendTracker>>,
    default_timeout: Duration,
}

impl EventChannel {
    pub(crate) fn new(
        raw: mpsc::UnboundedReceiver<EventPacket>,
        id_sizes: IdSizes,
        suspend: Arc<Mutex<SuspendTracker>>,
        default_timeout: Duration,
    ) -> Self {
        Self {
            raw,
            buffered: VecDeque::new(),
            id_sizes,
            suspend,
            default_timeout,
        }
    }

    /// Next event set in arrival order, waiting up to the default timeout.
    pub async fn receive_event(&mut self) -> JdwpResult<EventSet> {
        self.receive_event_within(self.default_timeout).await
    }

    /// Next event set in arrival order, waiting up to `timeout`. A timeout
    /// error here doubles as an absence assertion in tests.
    pub async fn receive_event_within(&mut self, timeout: Duration) -> JdwpResult<EventSet> {
        if let Some(set) = self.buffered.pop_front() {
            return Ok(set);
        }
        self.await_next(Instant::now() + timeout, timeout, "any event")
            .await
    }

    /// Next event set without waiting, or `None` if nothing has arrived.
    pub async fn try_receive_event(&mut self) -> JdwpResult<Option<EventSet>> {
        if let Some(set) = self.buffered.pop_front() {
            return Ok(Some(set));
        }
        match self.raw.try_recv() {
            Ok(packet) => Ok(Some(self.ingest(packet).await?)),
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => Err(JdwpError::ConnectionClosed),
        }
    }

    /// Wait for an event set containing an event of `kind`, up to the
    /// default timeout.
    pub async fn receive_certain_event(&mut self, kind: u8) -> JdwpResult<EventSet> {
        self.receive_certain_event_within(kind, self.default_timeout)
            .await
    }

    /// Wait for an event set containing an event of `kind`. Sets of other
    /// kinds that arrive in the meantime are buffered for later receives,
    /// preserving their arrival order.
    pub async fn receive_certain_event_within(
        &mut self,
        kind: u8,
        timeout: Duration,
    ) -> JdwpResult<EventSet> {
        if let Some(pos) = self.buffered.iter().position(|set| set.has_kind(kind)) {
            if let Some(set) = self.buffered.remove(pos) {
                return Ok(set);
            }
        }

        let deadline = Instant::now() + timeout;
        loop {
            let set = self
                .await_next(deadline, timeout, event_kinds::name(kind))
                .await?;
            if set.has_kind(kind) {
                return Ok(set);
            }
            debug!(
                "Buffering event set ({} events) while waiting for {}",
                set.events.len(),
                event_kinds::name(kind)
            );
            self.buffered.push_back(set);
        }
    }

    pub fn buffered_len(&self) -> usize {
        self.buffered.len()
    }

    async fn await_next(
        &mut self,
        deadline: Instant,
        waited: Duration,
        what: &str,
    ) -> JdwpResult<EventSet> {
        let packet = tokio::time::timeout_at(deadline, self.raw.recv())
            .await
            .map_err(|_| JdwpError::Timeout {
                waited,
                what: format!("event: {what}"),
            })?
            .ok_or(JdwpError::ConnectionClosed)?;
        self.ingest(packet).await
    }

    /// Decode one packet and fold its suspend policy and thread lifecycle
    /// effects into the shared tracker.
    async fn ingest(&mut self, packet: EventPacket) -> JdwpResult<EventSet> {
        let set = EventSet::decode(&packet, self.id_sizes)?;

        let mut tracker = self.suspend.lock().await;
        for event in &set.events {
            if let EventKind::ThreadStart { thread } = event.details {
                tracker.register_thread(thread);
            }
        }
        tracker.apply_suspend_policy(set.suspend_policy, set.event_thread());
        for event in &set.events {
            if let EventKind::ThreadDeath { thread } = event.details {
                tracker.forget_thread(thread);
            }
        }

        Ok(set)
    }
}
