//! Notification inbox state.

use qa_playground_shared::{Notification, NotificationFrame};

/// Notifications, newest first, plus the number still unread.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationState {
    pub notifications: Vec<Notification>,
    pub unread_count: usize,
}

impl NotificationState {
    /// Apply one frame. Returns the notification if it is new.
    pub fn apply(&mut self, frame: NotificationFrame) -> Option<Notification> {
        match frame {
            NotificationFrame::Notification { notification } => {
                if self.notifications.iter().any(|n| n.id == notification.id) {
                    return None;
                }
                self.notifications.insert(0, notification.clone());
                self.recount();
                Some(notification)
            }
            NotificationFrame::NotificationRead { notification_id } => {
                self.mark_read(&notification_id);
                None
            }
            NotificationFrame::NotificationHistory { notifications } => {
                self.notifications = notifications;
                self.recount();
                None
            }
        }
    }

    /// Returns whether the notification was unread.
    pub fn mark_read(&mut self, id: &str) -> bool {
        let changed = match self.notifications.iter_mut().find(|n| n.id == id) {
            Some(n) if !n.read => {
                n.read = true;
                true
            }
            _ => false,
        };
        self.recount();
        changed
    }

    /// Returns how many notifications changed.
    pub fn mark_all_read(&mut self) -> usize {
        let mut changed = 0;
        for n in self.notifications.iter_mut().filter(|n| !n.read) {
            n.read = true;
            changed += 1;
        }
        self.unread_count = 0;
        changed
    }

    fn recount(&mut self) {
        self.unread_count = self.notifications.iter().filter(|n| !n.read).count();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notification(id: &str, read: bool) -> Notification {
        Notification {
            id: id.to_string(),
            title: format!("title {id}"),
            message: String::new(),
            read,
            created_at: None,
        }
    }

    #[test]
    fn new_notifications_go_first() {
        let mut state = NotificationState::default();
        assert!(state
            .apply(NotificationFrame::Notification {
                notification: notification("1", false)
            })
            .is_some());
        state.apply(NotificationFrame::Notification {
            notification: notification("2", false),
        });
        assert!(state
            .apply(NotificationFrame::Notification {
                notification: notification("2", false)
            })
            .is_none());

        let ids: Vec<&str> = state.notifications.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "1"]);
        assert_eq!(state.unread_count, 2);
    }

    #[test]
    fn history_and_read_markers() {
        let mut state = NotificationState::default();
        state.apply(NotificationFrame::NotificationHistory {
            notifications: vec![notification("3", false), notification("2", true), notification("1", false)],
        });
        assert_eq!(state.unread_count, 2);

        state.apply(NotificationFrame::NotificationRead {
            notification_id: "3".to_string(),
        });
        assert_eq!(state.unread_count, 1);
        assert!(!state.mark_read("3"));
        assert!(!state.mark_read("missing"));

        assert_eq!(state.mark_all_read(), 1);
        assert_eq!(state.unread_count, 0);
        assert!(state.notifications.iter().all(|n| n.read));
    }
}
