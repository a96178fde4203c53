//! Notification feed channel with unread tracking.

use std::sync::Arc;

use qa_playground_shared::{Notification, NotificationCommand, NotificationFrame};
use tokio::sync::watch;

use super::channel::{use_websocket, SocketCallbacks, SocketChannel, SocketEndpoint};
use super::decode_message;
use crate::notify::{SystemNotifier, TracingNotifier};
use crate::stores::NotificationState;

#[derive(Clone)]
pub struct NotificationOptions {
    /// Raise a system notification for every new item, if permitted.
    pub show_system_notifications: bool,
    pub notifier: Arc<dyn SystemNotifier>,
}

impl Default for NotificationOptions {
    fn default() -> Self {
        Self {
            show_system_notifications: false,
            notifier: Arc::new(TracingNotifier),
        }
    }
}

impl NotificationOptions {
    pub fn system_notifications(mut self, notifier: Arc<dyn SystemNotifier>) -> Self {
        self.show_system_notifications = true;
        self.notifier = notifier;
        self
    }
}

/// The signed-in user's inbox on `/notifications`.
pub struct NotificationChannel {
    socket: SocketChannel,
    state: Arc<watch::Sender<NotificationState>>,
}

pub fn use_notifications(endpoint: SocketEndpoint, options: NotificationOptions) -> NotificationChannel {
    let (state, _) = watch::channel(NotificationState::default());
    let state = Arc::new(state);

    let callbacks = SocketCallbacks::default().on_message({
        let state = Arc::clone(&state);
        move |message| {
            let Some(frame) = decode_message::<NotificationFrame>("notifications", message) else {
                return;
            };
            let mut added = None;
            state.send_modify(|s| added = s.apply(frame));

            if let Some(notification) = added {
                let notifier = &options.notifier;
                if options.show_system_notifications && notifier.permission_granted() {
                    notifier.notify(&notification.title, &notification.message);
                }
            }
        }
    });
    let socket = use_websocket(endpoint, "notifications", callbacks);

    NotificationChannel { socket, state }
}

impl NotificationChannel {
    /// Mark one notification read locally and tell the server.
    pub fn mark_as_read(&self, id: &str) {
        self.state.send_if_modified(|s| s.mark_read(id));
        self.socket.send_json(&NotificationCommand::MarkRead {
            notification_id: id.to_string(),
        });
    }

    pub fn mark_all_as_read(&self) {
        self.state.send_if_modified(|s| s.mark_all_read() > 0);
        self.socket.send_json(&NotificationCommand::MarkAllRead);
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.state.borrow().notifications.clone()
    }

    pub fn unread_count(&self) -> usize {
        self.state.borrow().unread_count
    }

    pub fn state(&self) -> NotificationState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<NotificationState> {
        self.state.subscribe()
    }

    pub fn socket(&self) -> &SocketChannel {
        &self.socket
    }

    pub fn teardown(&self) {
        self.socket.teardown();
    }
}
