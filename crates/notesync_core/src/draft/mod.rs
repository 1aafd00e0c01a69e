//! Draft editing support.

pub mod history;

pub use history::{is_word_boundary_char, DraftHistory, DraftSnapshot};
