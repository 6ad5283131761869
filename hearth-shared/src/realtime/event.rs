/// Realtime event wire format
///
/// Every committed change to house-scoped data becomes one event:
///
/// ```json
/// {
///   "type": "task_update",
///   "action": "assigned",
///   "house_id": "5b0c…",
///   "payload": { "id": "…", "status": "assigned" },
///   "sent_at": "2026-01-05T12:00:00Z"
/// }
/// ```
///
/// Clients treat events as invalidation hints only. The payload is
/// informational; the REST API stays the source of truth.
///
/// Besides events the socket carries a few control frames: the client's
/// `auth` frame and the server's `ready` and `error` frames.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// What kind of data changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    TaskUpdate,
    DeviceUpdate,
    ShoppingListUpdate,
    Notification,
    MembershipUpdate,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::TaskUpdate => "task_update",
            EventType::DeviceUpdate => "device_update",
            EventType::ShoppingListUpdate => "shopping_list_update",
            EventType::Notification => "notification",
            EventType::MembershipUpdate => "membership_update",
        }
    }
}

/// How it changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventAction {
    Created,
    Updated,
    Deleted,
    Assigned,
    Unassigned,
    Completed,
    Joined,
    Removed,
}

/// One change notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealtimeEvent {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub action: EventAction,
    pub house_id: Uuid,
    #[serde(default)]
    pub payload: JsonValue,
    pub sent_at: DateTime<Utc>,
}

impl RealtimeEvent {
    /// Builds an event stamped with the current time
    ///
    /// A payload that fails to serialize is replaced by `null`; the event is
    /// still useful as an invalidation hint.
    pub fn new(
        event_type: EventType,
        action: EventAction,
        house_id: Uuid,
        payload: impl Serialize,
    ) -> Self {
        let payload = serde_json::to_value(payload).unwrap_or_else(|e| {
            tracing::warn!(error = %e, event_type = event_type.as_str(), "Dropping unserializable event payload");
            JsonValue::Null
        });

        Self {
            event_type,
            action,
            house_id,
            payload,
            sent_at: Utc::now(),
        }
    }

    pub fn task(action: EventAction, house_id: Uuid, payload: impl Serialize) -> Self {
        Self::new(EventType::TaskUpdate, action, house_id, payload)
    }

    pub fn device(action: EventAction, house_id: Uuid, payload: impl Serialize) -> Self {
        Self::new(EventType::DeviceUpdate, action, house_id, payload)
    }

    pub fn shopping(action: EventAction, house_id: Uuid, payload: impl Serialize) -> Self {
        Self::new(EventType::ShoppingListUpdate, action, house_id, payload)
    }

    pub fn membership(action: EventAction, house_id: Uuid, payload: impl Serialize) -> Self {
        Self::new(EventType::MembershipUpdate, action, house_id, payload)
    }

    /// A new in-app notification for a single user
    pub fn notification(house_id: Uuid, payload: impl Serialize) -> Self {
        Self::new(EventType::Notification, EventAction::Created, house_id, payload)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Frames sent by the client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Must be the first frame on a new socket
    Auth { token: String },
}

/// Control frames sent by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlFrame {
    /// Authentication succeeded; events follow
    Ready { user_id: Uuid },

    /// The server is about to close the socket
    Error { message: String },
}

/// Anything the server may send
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServerFrame {
    Control(ControlFrame),
    Event(RealtimeEvent),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_wire_format() {
        let house_id = Uuid::new_v4();
        let event = RealtimeEvent::task(EventAction::Assigned, house_id, json!({"id": "t1"}));

        let value: JsonValue = serde_json::from_str(&event.to_json().unwrap()).unwrap();

        assert_eq!(value["type"], "task_update");
        assert_eq!(value["action"], "assigned");
        assert_eq!(value["house_id"], house_id.to_string());
        assert_eq!(value["payload"]["id"], "t1");
        assert!(value["sent_at"].as_str().is_some());
    }

    #[test]
    fn test_event_type_names_match_serde() {
        for event_type in [
            EventType::TaskUpdate,
            EventType::DeviceUpdate,
            EventType::ShoppingListUpdate,
            EventType::Notification,
            EventType::MembershipUpdate,
        ] {
            assert_eq!(
                serde_json::to_value(event_type).unwrap(),
                JsonValue::String(event_type.as_str().to_string())
            );
        }
    }

    #[test]
    fn test_client_auth_frame() {
        let frame: ClientFrame = serde_json::from_str(r#"{"type":"auth","token":"abc"}"#).unwrap();
        assert_eq!(frame, ClientFrame::Auth { token: "abc".to_string() });
    }

    #[test]
    fn test_server_frame_distinguishes_control_and_events() {
        let user_id = Uuid::new_v4();
        let ready = serde_json::to_string(&ControlFrame::Ready { user_id }).unwrap();
        assert_eq!(
            serde_json::from_str::<ServerFrame>(&ready).unwrap(),
            ServerFrame::Control(ControlFrame::Ready { user_id })
        );

        let event = RealtimeEvent::shopping(EventAction::Created, Uuid::new_v4(), json!({}));
        let parsed: ServerFrame = serde_json::from_str(&event.to_json().unwrap()).unwrap();
        assert_eq!(parsed, ServerFrame::Event(event));
    }
}
