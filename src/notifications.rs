//! Short-lived status notifications.
//!
//! Every entry gets two independent timers: a fade timer that only flips the
//! entry's presentation, and an expiry timer that removes it. Timers fire as
//! [`NotificationTimer`] messages which the run loop hands back to the queue,
//! so all mutation stays on the loop.

use chrono::{
    DateTime,
    Local,
};
use std::{
    collections::HashMap,
    time::Duration,
};
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time,
};
use tracing::debug;

pub const DEFAULT_TTL: Duration = Duration::from_millis(5_000);
pub const DEFAULT_FADE_AFTER: Duration = Duration::from_millis(4_500);

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct NotificationId(u64);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Severity {
    Success,
    Error,
}

#[derive(Clone, Debug)]
pub struct Notification {
    pub id: NotificationId,
    pub severity: Severity,
    pub text: String,
    pub created_at: DateTime<Local>,
    pub faded: bool,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NotificationTimer {
    Fade(NotificationId),
    Expire(NotificationId),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct NotificationSettings {
    pub ttl: Duration,
    pub fade_after: Duration,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            fade_after: DEFAULT_FADE_AFTER,
        }
    }
}

/// Receiving half of the queue's timers, polled by the run loop.
pub struct NotificationTimers {
    rx: mpsc::UnboundedReceiver<NotificationTimer>,
}

impl NotificationTimers {
    pub async fn next(&mut self) -> Option<NotificationTimer> {
        self.rx.recv().await
    }
}

struct EntryTimers {
    fade: JoinHandle<()>,
    expire: JoinHandle<()>,
}

impl EntryTimers {
    fn abort(self) {
        self.fade.abort();
        self.expire.abort();
    }
}

pub struct NotificationQueue {
    entries: Vec<Notification>,
    timers: HashMap<NotificationId, EntryTimers>,
    next_id: u64,
    settings: NotificationSettings,
    timer_tx: mpsc::UnboundedSender<NotificationTimer>,
}

impl NotificationQueue {
    pub fn new(settings: NotificationSettings) -> (Self, NotificationTimers) {
        let (timer_tx, rx) = mpsc::unbounded_channel();
        let queue = Self {
            entries: Vec::new(),
            timers: HashMap::new(),
            next_id: 0,
            settings,
            timer_tx,
        };
        (queue, NotificationTimers { rx })
    }

    /// Appends a notification and schedules its fade and expiry.
    ///
    /// Must be called from within a tokio runtime.
    pub fn enqueue(
        &mut self,
        severity: Severity,
        text: impl Into<String>,
    ) -> NotificationId {
        let id = NotificationId(self.next_id);
        self.next_id += 1;
        self.entries.push(Notification {
            id,
            severity,
            text: text.into(),
            created_at: Local::now(),
            faded: false,
        });
        let timers = EntryTimers {
            fade: self.schedule(self.settings.fade_after, NotificationTimer::Fade(id)),
            expire: self.schedule(self.settings.ttl, NotificationTimer::Expire(id)),
        };
        self.timers.insert(id, timers);
        id
    }

    /// Removes the entry if present. Returns whether anything was removed.
    pub fn dismiss(&mut self, id: NotificationId) -> bool {
        if let Some(timers) = self.timers.remove(&id) {
            timers.abort();
        }
        let before = self.entries.len();
        self.entries.retain(|entry| entry.id != id);
        self.entries.len() != before
    }

    pub fn handle_timer(&mut self, timer: NotificationTimer) {
        match timer {
            NotificationTimer::Fade(id) => {
                if let Some(entry) = self.entries.iter_mut().find(|e| e.id == id) {
                    entry.faded = true;
                }
            }
            NotificationTimer::Expire(id) => {
                if !self.dismiss(id) {
                    debug!(?id, "expiry for a notification that is already gone");
                }
            }
        }
    }

    pub fn clear(&mut self) {
        for (_, timers) in self.timers.drain() {
            timers.abort();
        }
        self.entries.clear();
    }

    pub fn entries(&self) -> &[Notification] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn schedule(&self, delay: Duration, timer: NotificationTimer) -> JoinHandle<()> {
        let tx = self.timer_tx.clone();
        tokio::spawn(async move {
            time::sleep(delay).await;
            // The receiver is gone once the loop shuts down.
            let _ = tx.send(timer);
        })
    }
}
