//! Presentation notifications.
//!
//! Systems queue notifications while a frame runs; the simulation flushes
//! them to every subscribed listener at the end of `update`. With no
//! listeners a flush just drops the queue.

use crate::ids::AgentId;

/// Fire-and-forget message for UI/audio collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub category: String,
    pub agent: Option<AgentId>,
    pub message: String,
}

impl Notification {
    pub fn new(category: &str, agent: Option<AgentId>, message: impl Into<String>) -> Self {
        Self {
            category: category.to_string(),
            agent,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u32);

type Listener = Box<dyn FnMut(&Notification)>;

/// Listener registry plus the queue of undelivered notifications.
#[derive(Default)]
pub struct Notifier {
    next_id: u32,
    listeners: Vec<(ListenerId, Listener)>,
    queue: Vec<Notification>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&Notification) + 'static) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        before != self.listeners.len()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn queue(&mut self, notification: Notification) {
        log::debug!("[{}] {}", notification.category, notification.message);
        self.queue.push(notification);
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Deliver everything queued, in order. Returns how many were delivered.
    pub fn flush(&mut self) -> usize {
        let drained: Vec<Notification> = self.queue.drain(..).collect();
        for notification in &drained {
            self.deliver(notification);
        }
        drained.len()
    }

    fn deliver(&mut self, notification: &Notification) {
        for (_, listener) in &mut self.listeners {
            listener(notification);
        }
    }
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("listeners", &self.listeners.len())
            .field("queued", &self.queue.len())
            .finish()
    }
}
