//! Mesh Router (spec §4.6, §5): the single actor task that owns every
//! other component and drives the inbound/outbound message pipeline.
//! Nothing here is wrapped in `Arc<Mutex<..>>` — all mutable state is
//! confined to the task spawned by [`MeshRouter::start`], and every
//! other collaborator talks to it over `mpsc`/`oneshot`/`broadcast`
//! channels.

use crate::codec;
use crate::config::Config;
use crate::crypto::CryptoProvider;
use crate::dedup::{DedupCache, DedupStats, Observation};
use crate::error::SignalAirError;
use crate::events::{SecurityEvent, SecurityEventKind, Severity, SECURITY_EVENT_CHANNEL_CAPACITY};
use crate::message::{Message, MessageId, MessageType, PeerId};
use crate::peer::NeighborSet;
use crate::rate_guard::{is_bypass_eligible, AdmitVerdict, RateGuard, RateGuardStats};
use crate::selfdestruct::SelfDestructTracker;
use crate::transport::{Transport, TransportEvent};
use crate::trust::{Tier, TrustEvent, TrustLedger, TrustStatistics};

use bytes::Bytes;
use std::cmp::Reverse;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Delivered-message / peer-lifecycle stream handed out via
/// [`MeshHandle::events`] (spec §4.6 `on_receive`/`on_peer_connected`/
/// `on_peer_disconnected`).
#[derive(Debug, Clone)]
pub enum RouterEvent {
    MessageReceived(Message),
    PeerConnected(PeerId),
    PeerDisconnected(PeerId),
}

/// Aggregate point-in-time snapshot across every component (spec §4,
/// "stats()" on each component, rolled up for the application).
#[derive(Debug, Clone)]
pub struct RouterStats {
    pub dedup: DedupStats,
    pub rate: RateGuardStats,
    pub trust: TrustStatistics,
    pub connected_peers: usize,
    pub tracked_messages: usize,
}

enum RouterCommand {
    Broadcast {
        kind: MessageType,
        payload: Bytes,
        reply: oneshot::Sender<Result<MessageId, SignalAirError>>,
    },
    SendTo {
        peer: PeerId,
        kind: MessageType,
        payload: Bytes,
        reply: oneshot::Sender<Result<MessageId, SignalAirError>>,
    },
    ConnectedPeers(oneshot::Sender<Vec<PeerId>>),
    Stats(oneshot::Sender<RouterStats>),
    /// Internal: reported by a send-retry task after exhausting
    /// `retry_attempts` against a peer (spec §4.6, §7).
    MarkDisconnected(PeerId),
    Stop(oneshot::Sender<()>),
}

struct OutboundItem {
    priority: u8,
    seq: u64,
    peer: PeerId,
    message: Message,
}

/// Bounded, priority-ordered, FIFO-within-priority outbound queue (spec
/// §5). A plain `Vec` scanned linearly rather than a `BinaryHeap`: the
/// queue needs cheap access to both the highest-priority entry
/// (dispatch) and the lowest-priority/oldest entry (overflow eviction),
/// and a single `BinaryHeap` only gives one of those for free. Bounded
/// by `outbound_queue_cap`, so the scan stays cheap in practice.
struct OutboundQueue {
    items: Vec<OutboundItem>,
    capacity: usize,
    next_seq: u64,
}

impl OutboundQueue {
    fn new(capacity: usize) -> Self {
        Self {
            items: Vec::new(),
            capacity,
            next_seq: 0,
        }
    }

    fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Enqueues one item, evicting the lowest-priority entry first (ties
    /// broken by oldest) if already at capacity (spec §5 "on overflow,
    /// lowest-priority messages are dropped first").
    fn push(&mut self, peer: PeerId, message: Message) -> Option<OutboundItem> {
        let mut dropped = None;
        if self.items.len() >= self.capacity {
            if let Some((idx, _)) = self
                .items
                .iter()
                .enumerate()
                .min_by_key(|(_, item)| (item.priority, item.seq))
            {
                dropped = Some(self.items.remove(idx));
            }
        }
        let priority = message.priority();
        let seq = self.next_seq;
        self.next_seq += 1;
        self.items.push(OutboundItem {
            priority,
            seq,
            peer,
            message,
        });
        dropped
    }

    /// Drains the queue in dispatch order: highest priority first, FIFO
    /// within a priority tier.
    fn drain_sorted(&mut self) -> Vec<OutboundItem> {
        let mut items = std::mem::take(&mut self.items);
        items.sort_by_key(|item| (Reverse(item.priority), item.seq));
        items
    }
}

/// Per-peer sliding-window inbound-frame counter backing the "excessive
/// broadcast" trust event (spec §4.4 table: "> 50 msgs / 60 s").
/// Deliberately separate from `RateGuard`'s buckets: this only feeds the
/// advisory trust score, never an admission decision.
struct BroadcastFrequencyTracker {
    history: std::collections::HashMap<PeerId, std::collections::VecDeque<u64>>,
    window_ms: u64,
    threshold: usize,
}

impl BroadcastFrequencyTracker {
    fn new(window_ms: u64, threshold: usize) -> Self {
        Self {
            history: std::collections::HashMap::new(),
            window_ms,
            threshold,
        }
    }

    /// Records one observation for `peer` and returns whether the count
    /// within the trailing window now exceeds the threshold.
    fn observe(&mut self, peer: &PeerId, now_ms: u64) -> bool {
        let entry = self.history.entry(peer.clone()).or_default();
        entry.push_back(now_ms);
        while let Some(&oldest) = entry.front() {
            if now_ms.saturating_sub(oldest) > self.window_ms {
                entry.pop_front();
            } else {
                break;
            }
        }
        entry.len() > self.threshold
    }
}

struct MeshRouter {
    local_id: PeerId,
    config: Config,
    transport: Arc<dyn Transport>,
    crypto: Arc<dyn CryptoProvider>,
    dedup: DedupCache,
    rate_guard: RateGuard,
    trust: TrustLedger,
    selfdestruct: SelfDestructTracker,
    neighbors: NeighborSet,
    outbound: OutboundQueue,
    broadcast_freq: BroadcastFrequencyTracker,
    /// Handles of in-flight `dispatch_send` tasks, so `stop()` can wait
    /// (bounded by `stop_drain_deadline`) for outstanding sends instead
    /// of dropping them mid-retry (spec §4.6 "Lifecycle").
    inflight_sends: tokio::task::JoinSet<()>,
    event_tx: broadcast::Sender<RouterEvent>,
    security_tx: broadcast::Sender<SecurityEvent>,
    command_tx: mpsc::Sender<RouterCommand>,
}

impl MeshRouter {
    fn emit_security(&self, kind: SecurityEventKind, peer: Option<PeerId>, severity: Severity, detail: impl Into<String>) {
        let _ = self.security_tx.send(SecurityEvent::new(kind, peer, severity, detail));
    }

    fn build_message(&self, kind: MessageType, payload: Bytes, target: Option<PeerId>) -> Result<Message, SignalAirError> {
        if payload.len() > self.config.max_data_packet_size {
            return Err(SignalAirError::PayloadTooLarge {
                actual: payload.len(),
                max: self.config.max_data_packet_size,
            });
        }
        let content_hash = self.crypto.hash(&payload);
        Ok(Message {
            id: Uuid::new_v4(),
            kind,
            source_id: self.local_id.clone(),
            target_id: target,
            origin_timestamp: now_ms(),
            ttl: self.config.default_ttl,
            payload,
            content_hash,
        })
    }

    /// A message originated locally by this node: tracked the same as an
    /// inbound first-seen message, then flooded to every neighbor.
    fn originate(&mut self, message: Message) {
        let now = now_ms();
        self.dedup.observe(&message, now);
        self.selfdestruct.track(message.id, message.kind, message.priority(), now);
        self.fanout(&message, None);
        self.drain_outbound();
    }

    /// Relays `message` to every connected neighbor except `exclude` (the
    /// peer it just arrived from, for locally-originated traffic this is
    /// `None`) and the message's own originator. Blacklisted peers never
    /// receive a copy; suspicious/untrusted peers receive one with `ttl`
    /// capped at `suspicious_ttl_cap` (spec §4.4, §4.6).
    #[instrument(skip_all, fields(message_id = %message.id, kind = ?message.kind))]
    fn fanout(&mut self, message: &Message, exclude: Option<&PeerId>) {
        for peer in self.neighbors.connected_peers() {
            if Some(&peer) == exclude || peer == message.source_id {
                continue;
            }
            match self.trust.tier_of(&peer) {
                Tier::Blacklisted => continue,
                Tier::Suspicious | Tier::Untrusted => {
                    let mut capped = message.clone();
                    if capped.ttl > self.config.suspicious_ttl_cap {
                        capped.ttl = self.config.suspicious_ttl_cap;
                    }
                    self.enqueue_outbound(peer, capped);
                }
                Tier::Trusted | Tier::Normal => {
                    self.enqueue_outbound(peer, message.clone());
                }
            }
        }
    }

    fn enqueue_outbound(&mut self, peer: PeerId, message: Message) {
        if let Some(dropped) = self.outbound.push(peer, message) {
            debug!(peer = %dropped.peer, message_id = %dropped.message.id, "outbound queue full, dropped lowest-priority entry");
        }
    }

    /// Pops everything currently queued, in priority order, and spawns a
    /// send-with-retry task per entry. Sends never block the actor loop.
    fn drain_outbound(&mut self) {
        for item in self.outbound.drain_sorted() {
            self.dispatch_send(item.peer, item.message);
        }
    }

    fn dispatch_send(&mut self, peer: PeerId, message: Message) {
        let transport = self.transport.clone();
        let security_tx = self.security_tx.clone();
        let command_tx = self.command_tx.clone();
        let retry_attempts = self.config.retry_attempts;
        self.inflight_sends.spawn(async move {
            let frame = codec::encode(&message);
            let mut attempt = 0u32;
            loop {
                match transport.send(&peer, frame.clone()).await {
                    Ok(()) => return,
                    Err(err) => {
                        attempt += 1;
                        if attempt > retry_attempts {
                            let _ = security_tx.send(SecurityEvent::new(
                                SecurityEventKind::TransportError,
                                Some(peer.clone()),
                                Severity::Warning,
                                format!("persistent send failure to {peer}: {err}"),
                            ));
                            let _ = command_tx.send(RouterCommand::MarkDisconnected(peer)).await;
                            return;
                        }
                        let backoff_ms = 100u64 * 2u64.pow(attempt - 1);
                        tokio::time::sleep(std::time::Duration::from_millis(backoff_ms)).await;
                    }
                }
            }
        });
    }

    /// Removes a peer's trust/neighbor state entirely, but only once
    /// neither the ban ledger nor the trust ledger has a reason to
    /// remember it — an active ban or a blacklisted score should survive
    /// a reconnect, so the peer can't launder its reputation by dropping
    /// and re-joining (spec §3 "Lifecycle").
    fn prune_if_eligible(&mut self, peer: &PeerId) {
        let now = now_ms();
        if !self.rate_guard.is_banned(peer, now) && !matches!(self.trust.tier_of(peer), Tier::Blacklisted) {
            self.trust.remove(peer);
            self.neighbors.remove(peer);
        }
    }

    async fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::PeerConnected(peer) => {
                let now = now_ms();
                if !self.neighbors.connect(peer.clone(), now) {
                    self.emit_security(
                        SecurityEventKind::PeerJoined,
                        Some(peer),
                        Severity::Warning,
                        "connection rejected: neighbor set at max_connections",
                    );
                    return;
                }
                info!(peer = %peer, "peer connected");
                self.emit_security(SecurityEventKind::PeerJoined, Some(peer.clone()), Severity::Info, "peer connected");
                let _ = self.event_tx.send(RouterEvent::PeerConnected(peer));
            }
            TransportEvent::PeerDisconnected(peer) => {
                self.neighbors.disconnect(&peer);
                self.emit_security(SecurityEventKind::PeerLeft, Some(peer.clone()), Severity::Info, "peer disconnected");
                let _ = self.event_tx.send(RouterEvent::PeerDisconnected(peer.clone()));
                self.prune_if_eligible(&peer);
            }
            TransportEvent::BytesReceived(from, bytes) => {
                self.handle_frame(from, bytes).await;
            }
        }
    }

    #[instrument(skip(self, bytes), fields(from = %from))]
    async fn handle_frame(&mut self, from: PeerId, bytes: Bytes) {
        let now = now_ms();
        self.neighbors.touch(&from, now);

        let message = match codec::decode(&bytes, self.config.max_data_packet_size, self.crypto.as_ref()) {
            Ok(message) => message,
            Err(err) => {
                warn!(from = %from, error = %err, "malformed frame");
                // Spec §7: "repeated framing errors from the same peer
                // accrue malicious content events against the Trust
                // Ledger" — each occurrence is recorded, so the penalty
                // compounds with repetition rather than firing once.
                self.trust.record(&from, TrustEvent::MaliciousContent);
                self.emit_security(
                    SecurityEventKind::MalformedFrame,
                    Some(from),
                    Severity::Warning,
                    format!("decode failed: {err}"),
                );
                return;
            }
        };

        // An empty-payload `system` frame is a heartbeat (spec §4.6):
        // `neighbors.touch` above already recorded liveness, and
        // heartbeats never enter dedup/rate/trust accounting at all
        // (see DESIGN.md Open Question 2).
        if message.kind == MessageType::System && message.payload.is_empty() {
            return;
        }

        // Spec §4.6 step 2 (dedup) runs before step 3 (rate): legit mesh
        // re-flood of the same content is what dedup exists to absorb
        // cheaply, so a duplicate must never reach the suspicion tracker
        // or consume a rate token.
        match self.dedup.observe(&message, now) {
            Observation::Duplicate => {
                self.trust.record(&from, TrustEvent::DuplicateMessages);
                self.emit_security(SecurityEventKind::Duplicate, Some(from), Severity::Info, "duplicate message dropped");
                return;
            }
            Observation::FirstSeen => {}
        }

        let bypass = is_bypass_eligible(
            message.kind,
            message.payload.len(),
            self.config.emergency_bypass,
            &self.config.emergency_types,
        );

        if !bypass {
            match self.rate_guard.admit(&from, message.content_hash, now) {
                AdmitVerdict::Admit => {}
                AdmitVerdict::Rate => {
                    // Spec §8 scenario S3: rate-rejected frames accrue a
                    // trust penalty "via duplicate messages-equivalent
                    // policy" — same -3 delta as an actual duplicate.
                    self.trust.record(&from, TrustEvent::DuplicateMessages);
                    self.emit_security(SecurityEventKind::RateExceeded, Some(from), Severity::Warning, "rate limit exceeded");
                    return;
                }
                AdmitVerdict::Banned => {
                    self.emit_security(SecurityEventKind::Banned, Some(from), Severity::Critical, "peer is banned");
                    return;
                }
                AdmitVerdict::Suspicious => unreachable!("RateGuard::admit collapses Suspicious into Banned"),
            }
        }

        let deliver_locally = message.target_id.as_ref().map_or(true, |target| *target == self.local_id);
        if deliver_locally {
            // Spec §4.6 step 4 / §3 Lifecycle: trust credit and
            // self-destruct tracking only apply to frames this node
            // actually delivers (locally addressed or broadcast) — a
            // frame merely transiting this node toward another target
            // is relay-only (step 5).
            //
            // Spec §4.4 table: "excessive broadcast (> 50 msgs / 60 s)"
            // is a distinct, heavier penalty than the steady-state +1
            // for a successful delivery; one supersedes the other
            // rather than both applying to the same frame.
            if self.broadcast_freq.observe(&from, now) {
                self.trust.record(&from, TrustEvent::ExcessiveBroadcast);
            } else {
                self.trust.record(&from, TrustEvent::SuccessfulCommunication);
            }
            self.selfdestruct.track(message.id, message.kind, message.priority(), now);
            let _ = self.event_tx.send(RouterEvent::MessageReceived(message.clone()));
        }

        if message.ttl > 1 {
            let relayed = message.relayed();
            self.fanout(&relayed, Some(&from));
        }
        self.drain_outbound();
    }

    async fn send_heartbeats(&mut self) {
        let now = now_ms();
        let heartbeat = Message {
            id: Uuid::new_v4(),
            kind: MessageType::System,
            source_id: self.local_id.clone(),
            target_id: None,
            origin_timestamp: now,
            ttl: 1,
            payload: Bytes::new(),
            content_hash: self.crypto.hash(&[]),
        };
        for peer in self.neighbors.connected_peers() {
            self.enqueue_outbound(peer, heartbeat.clone());
        }
        self.drain_outbound();

        let peer_timeout_ms = self.config.peer_timeout.as_millis() as u64;
        for peer in self.neighbors.timed_out_peers(now, peer_timeout_ms) {
            self.neighbors.disconnect(&peer);
            self.emit_security(SecurityEventKind::PeerLeft, Some(peer.clone()), Severity::Warning, "peer timed out");
            let _ = self.event_tx.send(RouterEvent::PeerDisconnected(peer.clone()));
            self.prune_if_eligible(&peer);
        }
    }

    fn run_sweep(&mut self) {
        for event in self.selfdestruct.sweep(now_ms()) {
            let _ = self.security_tx.send(event);
        }
    }

    async fn handle_command(&mut self, command: RouterCommand) -> bool {
        match command {
            RouterCommand::Broadcast { kind, payload, reply } => {
                let result = match self.build_message(kind, payload, None) {
                    Ok(message) => {
                        let id = message.id;
                        self.originate(message);
                        Ok(id)
                    }
                    Err(err) => Err(err),
                };
                let _ = reply.send(result);
            }
            RouterCommand::SendTo { peer, kind, payload, reply } => {
                let result = match self.build_message(kind, payload, Some(peer)) {
                    Ok(message) => {
                        let id = message.id;
                        self.originate(message);
                        Ok(id)
                    }
                    Err(err) => Err(err),
                };
                let _ = reply.send(result);
            }
            RouterCommand::ConnectedPeers(reply) => {
                let _ = reply.send(self.neighbors.connected_peers());
            }
            RouterCommand::Stats(reply) => {
                let now = now_ms();
                let _ = reply.send(RouterStats {
                    dedup: self.dedup.stats(),
                    rate: self.rate_guard.stats(now),
                    trust: self.trust.statistics(),
                    connected_peers: self.neighbors.len(),
                    tracked_messages: self.selfdestruct.tracked_count(),
                });
            }
            RouterCommand::MarkDisconnected(peer) => {
                if self.neighbors.is_connected(&peer) {
                    self.neighbors.disconnect(&peer);
                    self.emit_security(
                        SecurityEventKind::PeerLeft,
                        Some(peer.clone()),
                        Severity::Warning,
                        "marked disconnected after persistent send failure",
                    );
                    let _ = self.event_tx.send(RouterEvent::PeerDisconnected(peer.clone()));
                    self.prune_if_eligible(&peer);
                }
            }
            RouterCommand::Stop(reply) => {
                // Spec §4.6 "Lifecycle": drain the outbound queue and wait
                // (up to `stop_drain_deadline`) for in-flight sends before
                // releasing the transport, rather than abandoning them.
                self.drain_outbound();
                let deadline = self.config.stop_drain_deadline;
                let inflight = &mut self.inflight_sends;
                let _ = tokio::time::timeout(deadline, async move {
                    while inflight.join_next().await.is_some() {}
                })
                .await;
                let _ = reply.send(());
                return false;
            }
        }
        true
    }

    async fn run(mut self, mut command_rx: mpsc::Receiver<RouterCommand>, mut transport_events: mpsc::Receiver<TransportEvent>) {
        let mut heartbeat = tokio::time::interval_at(Instant::now() + self.config.heartbeat_interval, self.config.heartbeat_interval);
        let mut sweep = tokio::time::interval_at(Instant::now() + self.config.cleanup_interval, self.config.cleanup_interval);

        loop {
            tokio::select! {
                Some(event) = transport_events.recv() => {
                    self.handle_transport_event(event).await;
                }
                Some(command) = command_rx.recv() => {
                    if !self.handle_command(command).await {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    self.send_heartbeats().await;
                }
                _ = sweep.tick() => {
                    self.run_sweep();
                }
            }
        }
        debug!("mesh router stopped");
    }
}

/// `Clone`-able, `Send + Sync` façade the application holds onto. Every
/// method either fires a command at the actor and (for request/response
/// calls) awaits a `oneshot` reply, or hands back a `broadcast`
/// subscription — no method here ever touches actor-owned state
/// directly (spec §5 "no internal locking").
#[derive(Clone)]
pub struct MeshHandle {
    command_tx: mpsc::Sender<RouterCommand>,
    event_tx: broadcast::Sender<RouterEvent>,
    security_tx: broadcast::Sender<SecurityEvent>,
}

impl MeshHandle {
    /// Starts the mesh router as a background task and returns a handle
    /// to it. Fails only if `config` doesn't validate (spec §7:
    /// "construction fails; no partial system exists").
    pub fn start(
        local_id: PeerId,
        config: Config,
        transport: Arc<dyn Transport>,
        crypto: Arc<dyn CryptoProvider>,
    ) -> Result<MeshHandle, SignalAirError> {
        config.validate()?;

        let transport_events = transport.subscribe();
        let (command_tx, command_rx) = mpsc::channel(256);
        let (event_tx, _) = broadcast::channel(SECURITY_EVENT_CHANNEL_CAPACITY);
        let (security_tx, _) = broadcast::channel(SECURITY_EVENT_CHANNEL_CAPACITY);

        let handle = MeshHandle {
            command_tx: command_tx.clone(),
            event_tx: event_tx.clone(),
            security_tx: security_tx.clone(),
        };

        let router = MeshRouter {
            local_id,
            dedup: DedupCache::new(config.n_dedup, config.n_replay),
            rate_guard: RateGuard::new(config.rate.clone(), config.ban.clone(), config.max_peer_records),
            trust: TrustLedger::new(),
            selfdestruct: SelfDestructTracker::new(config.message_lifetime.as_millis() as u64, config.metadata_retention_cap),
            neighbors: NeighborSet::new(config.max_connections),
            outbound: OutboundQueue::new(config.outbound_queue_cap),
            broadcast_freq: BroadcastFrequencyTracker::new(60_000, 50),
            inflight_sends: tokio::task::JoinSet::new(),
            config,
            transport,
            crypto,
            event_tx,
            security_tx,
            command_tx: command_tx.clone(),
        };

        tokio::spawn(router.run(command_rx, transport_events));
        Ok(handle)
    }

    pub async fn broadcast(&self, kind: MessageType, payload: Bytes) -> Result<MessageId, SignalAirError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(RouterCommand::Broadcast { kind, payload, reply: reply_tx })
            .await
            .map_err(|_| SignalAirError::Stopped)?;
        reply_rx.await.map_err(|_| SignalAirError::Stopped)?
    }

    pub async fn send_to(&self, peer: PeerId, kind: MessageType, payload: Bytes) -> Result<MessageId, SignalAirError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(RouterCommand::SendTo { peer, kind, payload, reply: reply_tx })
            .await
            .map_err(|_| SignalAirError::Stopped)?;
        reply_rx.await.map_err(|_| SignalAirError::Stopped)?
    }

    pub async fn connected_peers(&self) -> Result<Vec<PeerId>, SignalAirError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(RouterCommand::ConnectedPeers(reply_tx))
            .await
            .map_err(|_| SignalAirError::Stopped)?;
        reply_rx.await.map_err(|_| SignalAirError::Stopped)
    }

    pub async fn stats(&self) -> Result<RouterStats, SignalAirError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(RouterCommand::Stats(reply_tx))
            .await
            .map_err(|_| SignalAirError::Stopped)?;
        reply_rx.await.map_err(|_| SignalAirError::Stopped)
    }

    /// Raw subscription to delivered messages and peer lifecycle events.
    pub fn events(&self) -> broadcast::Receiver<RouterEvent> {
        self.event_tx.subscribe()
    }

    pub fn security_events(&self) -> broadcast::Receiver<SecurityEvent> {
        self.security_tx.subscribe()
    }

    /// Callback-style sugar over [`MeshHandle::events`] (spec §4.6
    /// `on_receive`): spawns a task that drains the subscription and
    /// invokes `callback` once per delivered message, so applications
    /// that just want "do X when a message arrives" don't need to write
    /// their own receive loop.
    pub fn on_receive(&self, mut callback: impl FnMut(Message) + Send + 'static) {
        let mut rx = self.events();
        tokio::spawn(async move {
            while let Ok(event) = rx.recv().await {
                if let RouterEvent::MessageReceived(message) = event {
                    callback(message);
                }
            }
        });
    }

    pub fn on_peer_connected(&self, mut callback: impl FnMut(PeerId) + Send + 'static) {
        let mut rx = self.events();
        tokio::spawn(async move {
            while let Ok(event) = rx.recv().await {
                if let RouterEvent::PeerConnected(peer) = event {
                    callback(peer);
                }
            }
        });
    }

    pub fn on_peer_disconnected(&self, mut callback: impl FnMut(PeerId) + Send + 'static) {
        let mut rx = self.events();
        tokio::spawn(async move {
            while let Ok(event) = rx.recv().await {
                if let RouterEvent::PeerDisconnected(peer) = event {
                    callback(peer);
                }
            }
        });
    }

    /// Idempotent: stopping an already-stopped router is a no-op.
    pub async fn stop(&self) {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.command_tx.send(RouterCommand::Stop(reply_tx)).await.is_ok() {
            let _ = reply_rx.await;
        }
    }
}
