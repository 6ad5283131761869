/// Event to query-key table
///
/// | event                  | invalidated keys                          |
/// |------------------------|-------------------------------------------|
/// | `task_update`          | `Tasks(house)`                            |
/// | `device_update`        | `Devices(house)`                          |
/// | `shopping_list_update` | `ShoppingItems(house)`                    |
/// | `notification`         | `Notifications(viewer)`                   |
/// | `membership_update`    | `Members(house)`, `Houses(viewer)`, `Tasks(house)` |
///
/// Membership changes also hit the task list: removing a member releases
/// their assignments on the server.
///
/// The table only names keys. Payloads are never merged into cached data.

use crate::query::QueryKey;
use hearth_shared::realtime::{EventType, RealtimeEvent};
use uuid::Uuid;

pub fn invalidation_targets(event: &RealtimeEvent, viewer: Uuid) -> Vec<QueryKey> {
    let house = event.house_id;

    match event.event_type {
        EventType::TaskUpdate => vec![QueryKey::Tasks(house)],
        EventType::DeviceUpdate => vec![QueryKey::Devices(house)],
        EventType::ShoppingListUpdate => vec![QueryKey::ShoppingItems(house)],
        EventType::Notification => vec![QueryKey::Notifications(viewer)],
        EventType::MembershipUpdate => vec![
            QueryKey::Members(house),
            QueryKey::Houses(viewer),
            QueryKey::Tasks(house),
        ],
    }
}
