//! Session lifecycle notifications.

use futures_util::Stream;
use pubsub_rs::Pubsub;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionTopic {
    /// A call was refused because the session is not (or no longer) valid.
    Unauthorized,
    /// Login and logout.
    Changed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Unauthorized { method: String },
    LoggedIn,
    LoggedOut,
}

impl SessionEvent {
    fn topic(&self) -> SessionTopic {
        match self {
            SessionEvent::Unauthorized { .. } => SessionTopic::Unauthorized,
            SessionEvent::LoggedIn | SessionEvent::LoggedOut => SessionTopic::Changed,
        }
    }
}

/// Fan-out of [`SessionEvent`]s, so that re-authentication can be handled in
/// one place while every other call keeps going.
#[derive(Clone)]
pub struct SessionEvents {
    pubsub: Pubsub<SessionTopic, SessionEvent>,
}

impl Default for SessionEvents {
    fn default() -> Self {
        SessionEvents {
            pubsub: Pubsub::new(),
        }
    }
}

impl SessionEvents {
    pub async fn publish(&self, event: SessionEvent) {
        self.pubsub.publish(event.topic(), event).await;
    }

    /// Receive the events of the given topics, from now on.
    pub async fn subscribe(&self, topics: Vec<SessionTopic>) -> impl Stream<Item = SessionEvent> {
        let subscriber = self.pubsub.subscribe(topics).await;
        futures_util::stream::unfold(subscriber, |subscriber| async move {
            let (_topic, event) = subscriber.recv().await.ok()?;
            Some((event, subscriber))
        })
    }
}
