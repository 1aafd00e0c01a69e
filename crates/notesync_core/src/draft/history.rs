//! Undo/redo history for one draft editing session.
//!
//! # Responsibility
//! - Track the current `{title, body}` draft.
//! - Checkpoint at word granularity instead of per keystroke.
//!
//! # Invariants
//! - Both stacks are bounded; the oldest entry is evicted on overflow.
//! - A pushed snapshot never duplicates the top of its stack.
//! - Every applied change clears the redo stack.

use once_cell::sync::Lazy;
use regex::Regex;

static WORD_BOUNDARY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^(?:\s|[.,!?;:()\[\]{}"'`~@#$%^&*+=\\/<>|-])$"#)
        .expect("valid word boundary regex")
});

/// Whether `ch` separates words. A missing character (string edge) does.
pub fn is_word_boundary_char(ch: Option<char>) -> bool {
    match ch {
        None => true,
        Some(ch) => {
            let mut buf = [0u8; 4];
            WORD_BOUNDARY_RE.is_match(ch.encode_utf8(&mut buf))
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DraftSnapshot {
    pub title: String,
    pub body: String,
}

impl DraftSnapshot {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DraftHistory {
    current: DraftSnapshot,
    undo: Vec<DraftSnapshot>,
    redo: Vec<DraftSnapshot>,
    max_len: usize,
}

impl DraftHistory {
    pub fn new(initial: DraftSnapshot, max_len: usize) -> Self {
        Self {
            current: initial,
            undo: Vec::new(),
            redo: Vec::new(),
            max_len: max_len.max(1),
        }
    }

    pub fn current(&self) -> &DraftSnapshot {
        &self.current
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    /// Applies `next` as the current draft.
    ///
    /// Returns `false` when `next` equals the current draft.
    pub fn record_change(&mut self, next: DraftSnapshot, force_checkpoint: bool) -> bool {
        if next == self.current {
            return false;
        }
        if force_checkpoint || should_checkpoint(&self.current, &next) {
            let previous = self.current.clone();
            push_bounded(&mut self.undo, previous, self.max_len);
        }
        self.redo.clear();
        self.current = next;
        true
    }

    /// Restores the latest checkpoint. No-op when there is none.
    pub fn undo(&mut self) -> bool {
        let Some(previous) = self.undo.pop() else {
            return false;
        };
        let current = std::mem::replace(&mut self.current, previous);
        push_bounded(&mut self.redo, current, self.max_len);
        true
    }

    pub fn redo(&mut self) -> bool {
        let Some(next) = self.redo.pop() else {
            return false;
        };
        let current = std::mem::replace(&mut self.current, next);
        push_bounded(&mut self.undo, current, self.max_len);
        true
    }

    /// Drops both stacks and starts over from `initial`.
    pub fn reset(&mut self, initial: DraftSnapshot) {
        self.current = initial;
        self.undo.clear();
        self.redo.clear();
    }
}

fn push_bounded(stack: &mut Vec<DraftSnapshot>, snapshot: DraftSnapshot, max_len: usize) {
    if stack.last() == Some(&snapshot) {
        return;
    }
    stack.push(snapshot);
    if stack.len() > max_len {
        let overflow = stack.len() - max_len;
        stack.drain(..overflow);
    }
}

fn should_checkpoint(current: &DraftSnapshot, next: &DraftSnapshot) -> bool {
    let title_changed = current.title != next.title;
    let body_changed = current.body != next.body;
    match (title_changed, body_changed) {
        (true, false) => crosses_word_boundary(&current.title, &next.title),
        (false, true) => crosses_word_boundary(&current.body, &next.body),
        _ => true,
    }
}

/// Decides a checkpoint for a single-field edit from `prev` to `next`.
fn crosses_word_boundary(prev: &str, next: &str) -> bool {
    let prev_last = is_word_boundary_char(prev.chars().last());
    let next_last = is_word_boundary_char(next.chars().last());
    let prev_len = prev.chars().count();
    let next_len = next.chars().count();
    if next_len > prev_len {
        // A new word starts.
        prev_last && !next_last
    } else if next_len < prev_len {
        prev_last != next_last
    } else {
        true
    }
}
