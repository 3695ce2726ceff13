use std::collections::VecDeque;
use std::sync::Arc;

use axum::{Json, extract::State};
use dd_api_types::{Notice, NoticesResponse};
use tokio::sync::{RwLock, broadcast};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::AppState;

pub(crate) const MAX_NOTICES: usize = 50;

/// The most recent session notices, newest first.
#[derive(Default)]
pub(crate) struct NoticeLog {
    entries: RwLock<VecDeque<Notice>>,
}

impl NoticeLog {
    pub(crate) async fn push(&self, notice: Notice) {
        let mut entries = self.entries.write().await;
        entries.push_front(notice);
        entries.truncate(MAX_NOTICES);
    }

    pub(crate) async fn recent(&self) -> Vec<Notice> {
        self.entries.read().await.iter().cloned().collect()
    }
}

/// Copies every session notice into `log` until the session shuts down.
pub(crate) fn spawn_collector(log: Arc<NoticeLog>, mut notices: broadcast::Receiver<Notice>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match notices.recv().await {
                Ok(notice) => {
                    debug!(level = ?notice.level, message = %notice.message, "session notice");
                    log.push(notice).await;
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "notice collector fell behind");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

pub(crate) async fn list_notices(State(state): State<AppState>) -> Json<NoticesResponse> {
    Json(NoticesResponse {
        notices: state.notices.recent().await,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use dd_session::Notifier;

    #[tokio::test]
    async fn keeps_the_most_recent_notices_newest_first() {
        let log = NoticeLog::default();
        let notifier = Notifier::new();
        for index in 0..MAX_NOTICES + 5 {
            log.push(notifier.info(format!("notice {index}"))).await;
        }

        let recent = log.recent().await;
        assert_eq!(recent.len(), MAX_NOTICES);
        assert_eq!(recent[0].message, format!("notice {}", MAX_NOTICES + 4));
        assert_eq!(recent[MAX_NOTICES - 1].message, "notice 5");
    }

    #[tokio::test]
    async fn collector_stops_when_the_sender_is_gone() -> anyhow::Result<()> {
        let log = Arc::new(NoticeLog::default());
        let notifier = Notifier::new();
        let collector = spawn_collector(log.clone(), notifier.subscribe());

        notifier.warning("Account disconnected");
        drop(notifier);
        collector.await?;

        let recent = log.recent().await;
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].message, "Account disconnected");
        Ok(())
    }
}
