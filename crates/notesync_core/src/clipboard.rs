//! Clipboard seam.

use crate::error::ErrorClass;
use futures_util::future::LocalBoxFuture;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const COPY_FAILED_MESSAGE: &str = "Copy failed. Clipboard permission may be blocked.";
pub const PASTE_FAILED_MESSAGE: &str = "Paste failed. Clipboard permission may be blocked.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClipboardError {
    PermissionDenied,
    Unavailable(String),
}

impl ClipboardError {
    pub fn class(&self) -> ErrorClass {
        ErrorClass::RecoverableLocal
    }
}

impl Display for ClipboardError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PermissionDenied => write!(f, "clipboard permission denied"),
            Self::Unavailable(details) => write!(f, "clipboard unavailable: {details}"),
        }
    }
}

impl Error for ClipboardError {}

/// Platform clipboard access; both directions may be refused.
pub trait Clipboard {
    fn read_text(&self) -> LocalBoxFuture<'_, Result<String, ClipboardError>>;
    fn write_text<'a>(&'a self, text: &'a str) -> LocalBoxFuture<'a, Result<(), ClipboardError>>;
}
