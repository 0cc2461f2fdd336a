//! Queue of notifications currently on screen or pending interaction.

use std::collections::VecDeque;

use crate::types::AdNotification;

#[derive(Debug, Default)]
pub struct NotificationQueue {
    notifications: VecDeque<AdNotification>,
}

impl NotificationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_back(&mut self, notification: AdNotification) {
        self.notifications.push_back(notification);
    }

    pub fn get(&self, uuid: &str) -> Option<&AdNotification> {
        self.notifications.iter().find(|n| n.uuid == uuid)
    }

    pub fn remove(&mut self, uuid: &str) -> Option<AdNotification> {
        let index = self.notifications.iter().position(|n| n.uuid == uuid)?;
        self.notifications.remove(index)
    }

    pub fn remove_all(&mut self) -> Vec<AdNotification> {
        self.notifications.drain(..).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.notifications.is_empty()
    }

    pub fn len(&self) -> usize {
        self.notifications.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notification(uuid: &str) -> AdNotification {
        AdNotification {
            uuid: uuid.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_get_and_remove_by_uuid() {
        let mut queue = NotificationQueue::new();
        queue.push_back(notification("u1"));
        queue.push_back(notification("u2"));

        assert!(queue.get("u1").is_some());
        assert!(queue.remove("u1").is_some());
        assert!(queue.get("u1").is_none());
        assert!(queue.remove("u1").is_none());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_remove_all_drains_in_order() {
        let mut queue = NotificationQueue::new();
        queue.push_back(notification("u1"));
        queue.push_back(notification("u2"));

        let removed = queue.remove_all();
        assert_eq!(removed.len(), 2);
        assert_eq!(removed[0].uuid, "u1");
        assert!(queue.is_empty());
    }
}
