//! Transient user-facing notices.
//!
//! Notices expire on their own; nothing here blocks the caller.

pub const DEFAULT_NOTICE_DURATION_MS: u64 = 1_600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Success,
    Error,
}

pub type NoticeId = u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub id: NoticeId,
    pub message: String,
    pub kind: NoticeKind,
    pub expires_at_ms: i64,
}

#[derive(Debug)]
pub struct NoticeBoard {
    notices: Vec<Notice>,
    next_id: NoticeId,
    default_duration_ms: u64,
}

impl Default for NoticeBoard {
    fn default() -> Self {
        Self::new(DEFAULT_NOTICE_DURATION_MS)
    }
}

impl NoticeBoard {
    pub fn new(default_duration_ms: u64) -> Self {
        Self {
            notices: Vec::new(),
            next_id: 1,
            default_duration_ms,
        }
    }

    /// Shows `message` until `now_ms + duration` (default duration when `None`).
    pub fn show(
        &mut self,
        message: impl Into<String>,
        kind: NoticeKind,
        duration_ms: Option<u64>,
        now_ms: i64,
    ) -> NoticeId {
        let id = self.next_id;
        self.next_id += 1;
        let duration_ms = duration_ms.unwrap_or(self.default_duration_ms);
        self.notices.push(Notice {
            id,
            message: message.into(),
            kind,
            expires_at_ms: now_ms.saturating_add(duration_ms as i64),
        });
        id
    }

    pub fn dismiss(&mut self, id: NoticeId) -> bool {
        let before = self.notices.len();
        self.notices.retain(|notice| notice.id != id);
        self.notices.len() != before
    }

    /// Drops notices whose time is up; returns how many were removed.
    pub fn expire(&mut self, now_ms: i64) -> usize {
        let before = self.notices.len();
        self.notices.retain(|notice| notice.expires_at_ms > now_ms);
        before - self.notices.len()
    }

    pub fn active(&self) -> &[Notice] {
        &self.notices
    }

    pub fn latest(&self) -> Option<&Notice> {
        self.notices.last()
    }
}
