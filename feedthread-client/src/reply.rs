use std::collections::HashSet;

use crate::api::CommentId;

/// Which comment, if any, currently has its reply composer open
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ReplySession {
    active: Option<CommentId>,
}

impl ReplySession {
    pub fn new() -> ReplySession {
        ReplySession { active: None }
    }

    pub fn active(&self) -> Option<CommentId> {
        self.active
    }

    pub fn is_open_for(&self, comment: &CommentId) -> bool {
        self.active.as_ref() == Some(comment)
    }

    /// Opens the composer on `comment`, or closes it if it already was open
    /// there. Returns the new target.
    pub fn toggle(&mut self, comment: CommentId) -> Option<CommentId> {
        self.active = match self.active {
            Some(current) if current == comment => None,
            _ => Some(comment),
        };
        self.active
    }

    pub fn close(&mut self) {
        self.active = None;
    }

    pub(crate) fn forget(&mut self, removed: &HashSet<CommentId>) {
        if self.active.map_or(false, |c| removed.contains(&c)) {
            tracing::debug!(comment = ?self.active, "reply target was removed, closing composer");
            self.active = None;
        }
    }
}
