//! Defines an abstraction over the event sending mechanism.

use super::events::UserEvent;

/// A trait that abstracts the sending of user events.
///
/// This is "fire-and-forget" and doesn't return a result, simplifying its
/// use. Production surfaces implement it over their delivery channel (an
/// event-loop proxy, an mpsc sender); tests capture events the same way.
pub trait EventProxy: Send + Sync + Clone + 'static {
    fn send_event(&self, event: UserEvent);
}
