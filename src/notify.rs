/// Fire-and-forget notification boundary. Delivery is never awaited for
/// correctness: a failing sink must not roll back a financial posting.
/// Sinks swallow their own errors.
pub trait NotificationSink: Send + Sync {
    fn deliver(&self, user_id: &str, message: &str);
}

/// Default sink: writes notifications to stdout.
pub struct LogSink;

impl NotificationSink for LogSink {
    fn deliver(&self, user_id: &str, message: &str) {
        println!("[notify] {user_id}: {message}");
    }
}
