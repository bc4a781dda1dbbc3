use crate::config::RealtimeConfig;
use crate::domain::event::ChatEvent;
use dashmap::DashMap;
use opentelemetry::{
    KeyValue, global,
    metrics::{Counter, UpDownCounter},
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tracing::Instrument;

#[derive(Clone, Debug)]
struct Metrics {
    published_total: Counter<u64>,
    unrouted_total: Counter<u64>,
    active_rooms: UpDownCounter<i64>,
    gc_reclaimed_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("parley-server");
        Self {
            published_total: meter
                .u64_counter("parley_events_published_total")
                .with_description("Total chat events published to rooms")
                .build(),
            unrouted_total: meter
                .u64_counter("parley_events_unrouted_total")
                .with_description("Events published to rooms with no connected sessions")
                .build(),
            active_rooms: meter
                .i64_up_down_counter("parley_active_rooms")
                .with_description("Number of rooms with at least one session")
                .build(),
            gc_reclaimed_total: meter
                .u64_counter("parley_rooms_reclaimed_total")
                .with_description("Total stale rooms reclaimed by GC")
                .build(),
        }
    }
}

/// Per-user room registry. Each user identifier maps to one broadcast sender;
/// every connected session for that user holds a receiver. The registry is
/// mutated only by `subscribe` and `perform_gc` and read-only at publish time.
///
/// Delivery is best-effort: no persistence, no replay, no backpressure. A
/// session that lags past the channel capacity drops events and reconciles on
/// its next poll.
#[derive(Clone, Debug)]
pub struct RealtimeChannel {
    rooms: Arc<DashMap<String, broadcast::Sender<ChatEvent>>>,
    room_capacity: usize,
    metrics: Metrics,
}

impl RealtimeChannel {
    #[must_use]
    pub fn new(config: &RealtimeConfig) -> Self {
        Self {
            rooms: Arc::new(DashMap::new()),
            room_capacity: config.room_channel_capacity,
            metrics: Metrics::new(),
        }
    }

    /// Joins the caller to the room named after `user` and returns its event
    /// stream. The room is created on first join.
    #[tracing::instrument(skip(self))]
    pub fn subscribe(&self, user: &str) -> broadcast::Receiver<ChatEvent> {
        let tx = self
            .rooms
            .entry(user.to_string())
            .or_insert_with(|| {
                self.metrics.active_rooms.add(1, &[]);
                let (tx, _rx) = broadcast::channel(self.room_capacity);
                tx
            })
            .value()
            .clone();

        tx.subscribe()
    }

    /// Pushes an event to one room. Fire-and-forget: a room with no sessions
    /// or a send failure is logged, never surfaced.
    #[tracing::instrument(skip(self, event), fields(room = %room))]
    pub fn publish(&self, room: &str, event: ChatEvent) {
        if let Some(tx) = self.rooms.get(room) {
            if tx.send(event).is_ok() {
                tracing::trace!("Event delivered to room");
                self.metrics.published_total.add(1, &[KeyValue::new("status", "sent")]);
                return;
            }
        }
        tracing::debug!("No connected session for room");
        self.metrics.unrouted_total.add(1, &[]);
    }

    /// Reclaims rooms whose last session has disconnected.
    pub fn perform_gc(&self) {
        let mut reclaimed = 0;
        self.rooms.retain(|_, sender| {
            let active = sender.receiver_count() > 0;
            if !active {
                self.metrics.active_rooms.add(-1, &[]);
                reclaimed += 1;
            }
            active
        });

        if reclaimed > 0 {
            self.metrics.gc_reclaimed_total.add(reclaimed, &[]);
            tracing::info!(reclaimed, "Room GC reclaimed stale rooms");
        }
    }

    /// Periodic GC loop; runs until the shutdown signal flips.
    pub async fn run_gc(self, gc_interval_secs: u64, mut shutdown: watch::Receiver<bool>) {
        let mut gc_interval = tokio::time::interval(Duration::from_secs(gc_interval_secs));
        tracing::info!("Room GC worker started");

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = gc_interval.tick() => {
                    async {
                        self.perform_gc();
                    }
                    .instrument(tracing::debug_span!("room_gc_iteration"))
                    .await;
                }
            }
        }

        tracing::info!("Room GC worker shutting down...");
    }

    #[must_use]
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry;

    fn channel() -> RealtimeChannel {
        telemetry::init_test_telemetry();
        RealtimeChannel::new(&RealtimeConfig { room_channel_capacity: 16, room_gc_interval_secs: 60 })
    }

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let channel = channel();
        let mut rx = channel.subscribe("alice");

        channel.publish("alice", ChatEvent::ReadStateChanged { read_by: "bob".to_string() });

        let event = rx.recv().await.expect("event");
        assert!(matches!(event, ChatEvent::ReadStateChanged { read_by } if read_by == "bob"));
    }

    #[tokio::test]
    async fn publish_to_empty_room_is_a_noop() {
        let channel = channel();
        channel.publish("nobody", ChatEvent::ReadStateChanged { read_by: "bob".to_string() });
        assert_eq!(channel.room_count(), 0);
    }

    #[tokio::test]
    async fn gc_reclaims_rooms_without_sessions() {
        let channel = channel();
        let rx_stale = channel.subscribe("stale");
        let _rx_active = channel.subscribe("active");
        assert_eq!(channel.room_count(), 2);

        drop(rx_stale);
        channel.perform_gc();

        assert_eq!(channel.room_count(), 1, "GC should have reclaimed exactly 1 room");
    }
}
