// src/provider/events.rs — Provider-pushed events and the subscription hub

use serde::Serialize;
use std::sync::{Arc, Mutex, Weak};

/// Handle to the media stream the provider renders the avatar into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaStream {
    pub session_id: String,
    /// Real-time room URL the video surface attaches to.
    pub url: String,
    /// Room access token; never logged.
    #[serde(skip_serializing)]
    pub access_token: String,
}

/// Everything a provider connection can push at the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    AvatarStartTalking,
    AvatarStopTalking,
    StreamReady(MediaStream),
    StreamDisconnected,
    UserStart,
    UserStop,
}

impl ProviderEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ProviderEvent::AvatarStartTalking => "avatar_start_talking",
            ProviderEvent::AvatarStopTalking => "avatar_stop_talking",
            ProviderEvent::StreamReady(_) => "stream_ready",
            ProviderEvent::StreamDisconnected => "stream_disconnected",
            ProviderEvent::UserStart => "user_start",
            ProviderEvent::UserStop => "user_stop",
        }
    }
}

pub type EventHandler = Arc<dyn Fn(ProviderEvent) + Send + Sync>;

#[derive(Default)]
struct HubInner {
    next_id: u64,
    handlers: Vec<(u64, EventHandler)>,
}

/// Fan-out of provider events to every subscribed handler.
///
/// Provider adapters own one hub per connection and call [`EventHub::emit`];
/// consumers get a [`Subscription`] that detaches the handler when dropped.
#[derive(Clone, Default)]
pub struct EventHub {
    inner: Arc<Mutex<HubInner>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, handler: EventHandler) -> Subscription {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let id = inner.next_id;
        inner.next_id += 1;
        inner.handlers.push((id, handler));
        Subscription {
            id,
            hub: Arc::downgrade(&self.inner),
        }
    }

    /// Deliver `event` to all current handlers. Handlers run outside the lock
    /// so they may subscribe or unsubscribe re-entrantly.
    pub fn emit(&self, event: ProviderEvent) {
        let handlers: Vec<EventHandler> = {
            let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            inner.handlers.iter().map(|(_, h)| Arc::clone(h)).collect()
        };
        tracing::debug!("Provider event: {}", event.name());
        for handler in handlers {
            handler(event.clone());
        }
    }

    pub fn handler_count(&self) -> usize {
        self.inner
            .lock()
            .map(|inner| inner.handlers.len())
            .unwrap_or(0)
    }
}

/// Live registration of one handler. Dropping it unsubscribes.
pub struct Subscription {
    id: u64,
    hub: Weak<Mutex<HubInner>>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            if let Ok(mut inner) = hub.lock() {
                inner.handlers.retain(|(id, _)| *id != self.id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_handler(counter: Arc<AtomicUsize>) -> EventHandler {
        Arc::new(move |_event| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_emit_reaches_all_subscribers() {
        let hub = EventHub::new();
        let a = Arc::new(AtomicUsize::new(0));
        let b = Arc::new(AtomicUsize::new(0));
        let _sa = hub.subscribe(counting_handler(a.clone()));
        let _sb = hub.subscribe(counting_handler(b.clone()));

        hub.emit(ProviderEvent::UserStart);
        assert_eq!(a.load(Ordering::SeqCst), 1);
        assert_eq!(b.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let hub = EventHub::new();
        let count = Arc::new(AtomicUsize::new(0));
        let sub = hub.subscribe(counting_handler(count.clone()));
        assert_eq!(hub.handler_count(), 1);

        sub.unsubscribe();
        assert_eq!(hub.handler_count(), 0);
        hub.emit(ProviderEvent::StreamDisconnected);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_subscription_outliving_hub() {
        let hub = EventHub::new();
        let sub = hub.subscribe(Arc::new(|_| {}));
        drop(hub);
        drop(sub);
    }

    #[test]
    fn test_access_token_not_serialized() {
        let stream = MediaStream {
            session_id: "s1".into(),
            url: "wss://room".into(),
            access_token: "secret".into(),
        };
        let json = serde_json::to_string(&stream).unwrap();
        assert!(!json.contains("secret"));
        assert!(json.contains("wss://room"));
    }
}
