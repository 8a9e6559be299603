//! Dismissible banners for user-visible failures.

use chrono::{DateTime, Utc};
use serde::Serialize;
use workbench_activity::ActivityId;

/// Severity of a notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// A transient banner. The durable record lives on the activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub id: u64,
    pub level: NoticeLevel,
    pub message: String,
    /// The activity the notice is about, if any.
    pub activity_id: Option<ActivityId>,
    pub created_at: DateTime<Utc>,
}

/// Ordered notices with monotonically increasing ids.
#[derive(Debug, Default)]
pub(crate) struct NoticeBoard {
    notices: Vec<Notice>,
    next_id: u64,
}

impl NoticeBoard {
    pub(crate) fn push(
        &mut self,
        level: NoticeLevel,
        message: impl Into<String>,
        activity_id: Option<ActivityId>,
    ) -> Notice {
        self.next_id += 1;
        let notice = Notice {
            id: self.next_id,
            level,
            message: message.into(),
            activity_id,
            created_at: Utc::now(),
        };
        self.notices.push(notice.clone());
        notice
    }

    pub(crate) fn dismiss(&mut self, id: u64) -> bool {
        let before = self.notices.len();
        self.notices.retain(|n| n.id != id);
        self.notices.len() != before
    }

    pub(crate) fn all(&self) -> &[Notice] {
        &self.notices
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_dismiss() {
        let mut board = NoticeBoard::default();
        let first = board.push(NoticeLevel::Error, "Build failed", None);
        let second = board.push(NoticeLevel::Warning, "Slow", None);
        assert!(second.id > first.id);

        assert!(board.dismiss(first.id));
        assert!(!board.dismiss(first.id));
        assert_eq!(board.all(), [second]);
    }
}
