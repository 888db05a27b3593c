//! Notification boundary between the matching core and whoever owns the
//! trader sessions.

use crate::command::Notification;

/// Receives every notification the engine produces, in emission order.
///
/// Delivery is best-effort: the engine never waits for or retries a
/// notification, so implementations must not block on slow recipients.
pub trait NotificationSink {
    fn notify(&mut self, notification: Notification);
}

impl NotificationSink for Vec<Notification> {
    #[inline]
    fn notify(&mut self, notification: Notification) {
        self.push(notification);
    }
}

impl<S: NotificationSink + ?Sized> NotificationSink for &mut S {
    #[inline]
    fn notify(&mut self, notification: Notification) {
        (**self).notify(notification);
    }
}

impl<S: NotificationSink + ?Sized> NotificationSink for Box<S> {
    #[inline]
    fn notify(&mut self, notification: Notification) {
        (**self).notify(notification);
    }
}

/// Sink that counts and discards, for benchmarks.
#[derive(Debug, Default)]
pub struct DiscardSink {
    pub count: u64,
}

impl NotificationSink for DiscardSink {
    #[inline]
    fn notify(&mut self, _notification: Notification) {
        self.count += 1;
    }
}
