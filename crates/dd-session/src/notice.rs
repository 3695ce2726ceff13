use dd_api_types::{Notice, NoticeLevel};
use tokio::sync::broadcast;
use uuid::Uuid;

pub const DEFAULT_NOTICE_DURATION_MS: u64 = 3000;
const NOTICE_CAPACITY: usize = 64;

/// Fan-out of user-facing notices. Sending with no listeners is not an error.
#[derive(Clone)]
pub struct Notifier {
    tx: broadcast::Sender<Notice>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(NOTICE_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.tx.subscribe()
    }

    pub fn notify(&self, level: NoticeLevel, message: impl Into<String>) -> Notice {
        let notice = Notice {
            id: Uuid::new_v4(),
            level,
            message: message.into(),
            duration_ms: DEFAULT_NOTICE_DURATION_MS,
        };
        let _ = self.tx.send(notice.clone());
        notice
    }

    pub fn info(&self, message: impl Into<String>) -> Notice {
        self.notify(NoticeLevel::Info, message)
    }

    pub fn success(&self, message: impl Into<String>) -> Notice {
        self.notify(NoticeLevel::Success, message)
    }

    pub fn warning(&self, message: impl Into<String>) -> Notice {
        self.notify(NoticeLevel::Warning, message)
    }

    pub fn error(&self, message: impl Into<String>) -> Notice {
        self.notify(NoticeLevel::Error, message)
    }
}
