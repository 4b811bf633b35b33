use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::dto::ws::ServerEvent;

/// One broadcast channel per party room, created on first subscription.
///
/// Delivery is fire-and-forget: rooms without subscribers drop events and
/// lagging receivers skip what they missed.
pub struct RoomHub {
    capacity: usize,
    rooms: DashMap<String, broadcast::Sender<ServerEvent>>,
}

impl RoomHub {
    /// Create a hub whose rooms buffer up to `capacity` events per receiver.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            rooms: DashMap::new(),
        }
    }

    /// Register a new subscriber that will receive subsequent events of the room.
    pub fn subscribe(&self, party_code: &str) -> broadcast::Receiver<ServerEvent> {
        self.rooms
            .entry(party_code.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Send an event to every current subscriber of the room, returning how many got it.
    pub fn broadcast(&self, party_code: &str, event: ServerEvent) -> usize {
        let Some(sender) = self.rooms.get(party_code) else {
            return 0;
        };
        sender.send(event).unwrap_or(0)
    }

    /// Drop the room channel once its last subscriber is gone.
    pub fn release(&self, party_code: &str) {
        self.rooms
            .remove_if(party_code, |_, sender| sender.receiver_count() == 0);
    }

    pub fn subscriber_count(&self, party_code: &str) -> usize {
        self.rooms
            .get(party_code)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn event(name: &str) -> ServerEvent {
        ServerEvent::json(name, &json!({"n": 1})).unwrap()
    }

    #[tokio::test]
    async fn events_stay_inside_their_room() {
        let hub = RoomHub::new(8);
        let mut first = hub.subscribe("ROOM01");
        let mut second = hub.subscribe("ROOM02");

        assert_eq!(hub.broadcast("ROOM01", event("queue:updated")), 1);

        assert_eq!(first.recv().await.unwrap().event, "queue:updated");
        assert!(matches!(
            second.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[test]
    fn broadcasting_to_an_empty_room_is_a_no_op() {
        let hub = RoomHub::new(8);
        assert_eq!(hub.broadcast("NOBODY", event("party:ended")), 0);
    }

    #[test]
    fn release_only_drops_unused_rooms() {
        let hub = RoomHub::new(8);
        let receiver = hub.subscribe("ROOM01");

        hub.release("ROOM01");
        assert_eq!(hub.subscriber_count("ROOM01"), 1);

        drop(receiver);
        hub.release("ROOM01");
        assert_eq!(hub.subscriber_count("ROOM01"), 0);
        assert_eq!(hub.broadcast("ROOM01", event("queue:updated")), 0);
    }
}
