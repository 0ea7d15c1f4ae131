use crate::domain::{Notice, NoticeLevel, Notifier};

// Headless notifier: notices end up in the log instead of a toast.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Success => tracing::info!(notice = %notice.message, "user notice"),
            NoticeLevel::Error => tracing::warn!(notice = %notice.message, "user notice"),
        }
    }
}
