//! User-facing notices
//!
//! The engine is UI-agnostic: anything the user should see flows out of a
//! channel as a `Notice` and the embedding layer renders it however it
//! likes (the mini-app shows toasts). Dropping the receiver is fine; the
//! sender logs every notice regardless.

use tokio::sync::mpsc;

use crate::logger::{self, LogTag};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

#[derive(Clone)]
pub struct NoticeSender {
    tx: mpsc::UnboundedSender<Notice>,
}

impl NoticeSender {
    pub fn push(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Success => logger::info(LogTag::Session, &notice.message),
            NoticeLevel::Warning => logger::warning(LogTag::Session, &notice.message),
            NoticeLevel::Error => logger::error(LogTag::Session, &notice.message),
        }
        // receiver may be gone; the log line above is the fallback
        let _ = self.tx.send(notice);
    }
}

pub fn notice_channel() -> (NoticeSender, mpsc::UnboundedReceiver<Notice>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (NoticeSender { tx }, rx)
}
