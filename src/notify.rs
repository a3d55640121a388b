use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

/// Fire-and-forget sink for short human-readable alerts.
pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, body: &str);
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Notification {
    pub id: Uuid,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// Keeps the most recent notifications. Drops everything while the user
/// has not authorized notifications.
#[derive(Clone)]
pub struct NotificationCenter {
    authorized: bool,
    capacity: usize,
    delivered: Arc<Mutex<VecDeque<Notification>>>,
}

impl NotificationCenter {
    pub fn new(authorized: bool, capacity: usize) -> Self {
        Self {
            authorized,
            capacity,
            delivered: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
        }
    }

    /// Newest first.
    pub fn recent(&self) -> Vec<Notification> {
        match self.delivered.lock() {
            Ok(delivered) => delivered.iter().rev().cloned().collect(),
            Err(_) => Vec::new(),
        }
    }
}

impl Notifier for NotificationCenter {
    fn notify(&self, title: &str, body: &str) {
        if !self.authorized || self.capacity == 0 {
            return;
        }
        log::info!("notification: {} {}", title, body);

        let notification = Notification {
            id: Uuid::new_v4(),
            title: title.to_string(),
            body: body.to_string(),
            created_at: Utc::now(),
        };
        match self.delivered.lock() {
            Ok(mut delivered) => {
                if delivered.len() == self.capacity {
                    delivered.pop_front();
                }
                delivered.push_back(notification);
            }
            Err(e) => log::error!("add notification error: {}", e),
        }
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;

    #[derive(Clone, Default)]
    pub struct RecordingNotifier {
        pub sent: Arc<Mutex<Vec<(String, String)>>>,
    }

    impl RecordingNotifier {
        pub fn take(&self) -> Vec<(String, String)> {
            std::mem::take(&mut *self.sent.lock().unwrap())
        }
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, title: &str, body: &str) {
            self.sent
                .lock()
                .unwrap()
                .push((title.to_string(), body.to_string()));
        }
    }
}
