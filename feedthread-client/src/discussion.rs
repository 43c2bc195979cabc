use std::collections::{HashSet, VecDeque};

use crate::{
    api::{self, Backend, Comment, CommentId, PostId, UserId},
    error::validate,
    AuthError, Error, Forest, Notice, ReplySession,
};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Phase {
    Idle,
    Loading,
    Loaded,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Intent {
    Reply(CommentId),
    Add {
        content: String,
        parent_id: Option<CommentId>,
    },
    Edit {
        comment: CommentId,
        content: String,
    },
    ToggleLike(CommentId),
    Delete(CommentId),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Outcome {
    ReplyTarget(Option<CommentId>),
    Added(Comment),
    Edited(Comment),
    Liked(bool),
    /// Every comment removed from the view, the deleted one first
    Deleted(Vec<CommentId>),
}

#[must_use = "a pending load must be settled"]
#[derive(Debug)]
pub struct PendingLoad {
    previous: Phase,
}

#[must_use = "a pending add must be settled"]
#[derive(Debug)]
pub struct PendingAdd {
    content: String,
    parent_id: Option<CommentId>,
}

impl PendingAdd {
    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn parent_id(&self) -> Option<CommentId> {
        self.parent_id
    }
}

#[must_use = "a pending edit must be settled"]
#[derive(Debug)]
pub struct PendingEdit {
    comment: CommentId,
    content: String,
}

impl PendingEdit {
    pub fn comment(&self) -> CommentId {
        self.comment
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

#[must_use = "a pending like toggle must be settled"]
#[derive(Debug)]
pub struct PendingLike {
    comment: CommentId,
    now_liked: bool,
    snapshot: HashSet<UserId>,
}

impl PendingLike {
    pub fn comment(&self) -> CommentId {
        self.comment
    }

    pub fn now_liked(&self) -> bool {
        self.now_liked
    }
}

#[must_use = "a pending delete must be settled"]
#[derive(Debug)]
pub struct PendingDelete {
    comment: CommentId,
}

impl PendingDelete {
    pub fn comment(&self) -> CommentId {
        self.comment
    }
}

/// Local state of the discussion of one post.
///
/// Every intent is split in a synchronous `begin_*` half, which checks the
/// intent and applies its local effect, and a synchronous `settle_*` half,
/// which takes the backend's answer and commits or reverts. The `async`
/// helpers chain both around the backend call; event-loop front ends can also
/// call the halves themselves and keep several intents in flight. In that
/// case each field ends up as decided by the last intent to settle.
#[derive(Debug)]
pub struct Discussion {
    post: PostId,
    viewer: Option<UserId>,
    phase: Phase,

    /// Loaded in arrival order, with confirmed adds put in front
    comments: Vec<Comment>,

    reply: ReplySession,
    submitting: usize,
    notices: VecDeque<Notice>,
}

impl Discussion {
    pub fn new(post: PostId, viewer: Option<UserId>) -> Discussion {
        Discussion {
            post,
            viewer,
            phase: Phase::Idle,
            comments: Vec::new(),
            reply: ReplySession::new(),
            submitting: 0,
            notices: VecDeque::new(),
        }
    }

    pub fn post(&self) -> PostId {
        self.post
    }

    pub fn viewer(&self) -> Option<UserId> {
        self.viewer
    }

    pub fn set_viewer(&mut self, viewer: Option<UserId>) {
        if viewer.is_none() {
            self.reply.close();
        }
        self.viewer = viewer;
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    pub fn get(&self, comment: &CommentId) -> Option<&Comment> {
        self.comments.iter().find(|c| c.id == *comment)
    }

    pub fn forest(&self) -> Forest<'_> {
        Forest::build(&self.comments)
    }

    pub fn reply_session(&self) -> &ReplySession {
        &self.reply
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting > 0
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        self.notices.drain(..).collect()
    }

    fn reject<T>(&mut self, err: Error) -> Result<T, Error> {
        match err.is_durability() {
            true => tracing::warn!(%err, "intent failed"),
            false => tracing::debug!(%err, "intent rejected"),
        }
        self.notices.push_back(Notice::from(&err));
        Err(err)
    }

    fn ensure_loaded(&self) -> Result<(), Error> {
        match self.phase {
            Phase::Loaded => Ok(()),
            _ => Err(Error::NotLoaded),
        }
    }

    fn acting_user(&self) -> Result<UserId, Error> {
        self.viewer.ok_or(Error::Auth(AuthError::Unauthenticated))
    }

    fn position(&self, comment: &CommentId) -> Result<usize, Error> {
        self.comments
            .iter()
            .position(|c| c.id == *comment)
            .ok_or(Error::UnknownComment(*comment))
    }

    fn ensure_author(&self, comment: &CommentId) -> Result<(), Error> {
        let user = self.acting_user()?;
        let pos = self.position(comment)?;
        if self.comments[pos].author_id != user {
            return Err(Error::Auth(AuthError::NotAuthor(*comment)));
        }
        Ok(())
    }

    pub fn begin_load(&mut self) -> PendingLoad {
        let previous = self.phase;
        self.phase = Phase::Loading;
        tracing::debug!(post = ?self.post, ?previous, "loading discussion");
        PendingLoad { previous }
    }

    pub fn settle_load(
        &mut self,
        pending: PendingLoad,
        res: Result<Vec<Comment>, api::Error>,
    ) -> Result<usize, Error> {
        let comments = match res {
            Ok(comments) => comments,
            Err(e) => {
                self.phase = pending.previous;
                return self.reject(Error::Durability(e));
            }
        };
        let post = self.post;
        let (comments, foreign): (Vec<_>, Vec<_>) =
            comments.into_iter().partition(|c| c.post_id == post);
        if !foreign.is_empty() {
            tracing::warn!(
                ?post,
                num_foreign = foreign.len(),
                "backend returned comments of other posts"
            );
        }
        self.comments = comments;
        self.phase = Phase::Loaded;
        if let Some(target) = self.reply.active() {
            if self.get(&target).is_none() {
                self.reply.close();
            }
        }
        tracing::debug!(?post, num_comments = self.comments.len(), "discussion loaded");
        Ok(self.comments.len())
    }

    pub async fn load<B: Backend + ?Sized>(&mut self, backend: &B) -> Result<usize, Error> {
        let pending = self.begin_load();
        let res = backend.list_comments(self.post).await;
        self.settle_load(pending, res)
    }

    pub fn reply(&mut self, comment: CommentId) -> Result<Option<CommentId>, Error> {
        let checked = self
            .ensure_loaded()
            .and_then(|()| self.acting_user())
            .and_then(|_| self.position(&comment));
        if let Err(e) = checked {
            return self.reject(e);
        }
        Ok(self.reply.toggle(comment))
    }

    pub fn close_reply(&mut self) {
        self.reply.close();
    }

    fn check_add(&self, content: &str, parent_id: Option<CommentId>) -> Result<String, Error> {
        self.ensure_loaded()?;
        let content = validate(content)?;
        self.acting_user()?;
        if let Some(parent) = parent_id {
            self.position(&parent)?;
        }
        Ok(content)
    }

    /// Nothing is inserted until the backend confirms the comment: the only
    /// local effect is the submitting flag.
    pub fn begin_add(
        &mut self,
        content: &str,
        parent_id: Option<CommentId>,
    ) -> Result<PendingAdd, Error> {
        match self.check_add(content, parent_id) {
            Err(e) => self.reject(e),
            Ok(content) => {
                self.submitting += 1;
                tracing::debug!(post = ?self.post, ?parent_id, "submitting new comment");
                Ok(PendingAdd { content, parent_id })
            }
        }
    }

    pub fn settle_add(
        &mut self,
        pending: PendingAdd,
        res: Result<Comment, api::Error>,
    ) -> Result<Comment, Error> {
        self.submitting = self.submitting.saturating_sub(1);
        let comment = match res {
            Ok(comment) => comment,
            Err(e) => return self.reject(Error::Durability(e)),
        };
        if comment.post_id != self.post {
            tracing::warn!(comment = ?comment.id, post = ?comment.post_id, "backend created comment on another post");
        } else {
            self.merge(comment.clone());
        }
        if pending.parent_id.is_some() {
            self.reply.close();
        }
        Ok(comment)
    }

    fn merge(&mut self, comment: Comment) {
        match self.comments.iter_mut().find(|c| c.id == comment.id) {
            Some(existing) => *existing = comment,
            None => self.comments.insert(0, comment),
        }
    }

    pub async fn add<B: Backend + ?Sized>(
        &mut self,
        backend: &B,
        content: &str,
        parent_id: Option<CommentId>,
    ) -> Result<Comment, Error> {
        let pending = self.begin_add(content, parent_id)?;
        let res = backend
            .create_comment(self.post, pending.content.clone(), pending.parent_id)
            .await;
        self.settle_add(pending, res)
    }

    fn check_edit(&self, comment: &CommentId, content: &str) -> Result<String, Error> {
        self.ensure_loaded()?;
        let content = validate(content)?;
        self.ensure_author(comment)?;
        Ok(content)
    }

    pub fn begin_edit(&mut self, comment: CommentId, content: &str) -> Result<PendingEdit, Error> {
        match self.check_edit(&comment, content) {
            Err(e) => self.reject(e),
            Ok(content) => {
                tracing::debug!(?comment, "submitting comment edit");
                Ok(PendingEdit { comment, content })
            }
        }
    }

    /// The confirmed record replaces the local one, except for `liked_by`
    /// which only the like protocol touches.
    pub fn settle_edit(
        &mut self,
        pending: PendingEdit,
        res: Result<Comment, api::Error>,
    ) -> Result<Comment, Error> {
        let mut updated = match res {
            Ok(updated) => updated,
            Err(e) => return self.reject(Error::Durability(e)),
        };
        match self.comments.iter_mut().find(|c| c.id == pending.comment) {
            Some(local) => {
                updated.liked_by = std::mem::take(&mut local.liked_by);
                *local = updated.clone();
            }
            None => tracing::debug!(comment = ?pending.comment, "edited comment is no longer shown"),
        }
        Ok(updated)
    }

    pub async fn edit<B: Backend + ?Sized>(
        &mut self,
        backend: &B,
        comment: CommentId,
        content: &str,
    ) -> Result<Comment, Error> {
        let pending = self.begin_edit(comment, content)?;
        let res = backend
            .update_comment(pending.comment, pending.content.clone())
            .await;
        self.settle_edit(pending, res)
    }

    fn check_like(&self, comment: &CommentId) -> Result<(UserId, usize), Error> {
        self.ensure_loaded()?;
        let user = self.acting_user()?;
        let pos = self.position(comment)?;
        Ok((user, pos))
    }

    pub fn begin_toggle_like(&mut self, comment: CommentId) -> Result<PendingLike, Error> {
        let (user, pos) = match self.check_like(&comment) {
            Ok(checked) => checked,
            Err(e) => return self.reject(e),
        };
        let liked_by = &mut self.comments[pos].liked_by;
        let snapshot = liked_by.clone();
        let now_liked = !snapshot.contains(&user);
        match now_liked {
            true => liked_by.insert(user),
            false => liked_by.remove(&user),
        };
        tracing::debug!(?comment, now_liked, "applied like toggle");
        Ok(PendingLike {
            comment,
            now_liked,
            snapshot,
        })
    }

    /// On failure, puts back `liked_by` exactly as it was captured when the
    /// toggle began. Returns whether the viewer now likes the comment.
    pub fn settle_toggle_like(
        &mut self,
        pending: PendingLike,
        res: Result<(), api::Error>,
    ) -> Result<bool, Error> {
        let err = match res {
            Ok(()) => return Ok(pending.now_liked),
            Err(api::Error::AlreadyLiked(_)) if pending.now_liked => {
                tracing::debug!(comment = ?pending.comment, "comment was already liked");
                return Ok(true);
            }
            Err(e) => e,
        };
        match self.comments.iter_mut().find(|c| c.id == pending.comment) {
            Some(c) => {
                tracing::debug!(comment = ?pending.comment, "reverting like toggle");
                c.liked_by = pending.snapshot;
            }
            None => tracing::debug!(comment = ?pending.comment, "toggled comment is no longer shown"),
        }
        self.reject(Error::Durability(err))
    }

    pub async fn toggle_like<B: Backend + ?Sized>(
        &mut self,
        backend: &B,
        comment: CommentId,
    ) -> Result<bool, Error> {
        let pending = self.begin_toggle_like(comment)?;
        let res = match pending.now_liked {
            true => backend.like_comment(comment).await,
            false => backend.unlike_comment(comment).await,
        };
        self.settle_toggle_like(pending, res)
    }

    fn check_delete(&self, comment: &CommentId) -> Result<(), Error> {
        self.ensure_loaded()?;
        self.ensure_author(comment)
    }

    pub fn begin_delete(&mut self, comment: CommentId) -> Result<PendingDelete, Error> {
        match self.check_delete(&comment) {
            Err(e) => self.reject(e),
            Ok(()) => {
                tracing::debug!(?comment, "submitting comment deletion");
                Ok(PendingDelete { comment })
            }
        }
    }

    /// Once the backend deleted the comment, removes it along with all its
    /// replies, transitively. The replies stay stored on the backend.
    pub fn settle_delete(
        &mut self,
        pending: PendingDelete,
        res: Result<(), api::Error>,
    ) -> Result<Vec<CommentId>, Error> {
        if let Err(e) = res {
            return self.reject(Error::Durability(e));
        }
        let removed = descendants_and_self(&self.comments, pending.comment);
        let mut removed_ids = vec![pending.comment];
        removed_ids.extend(
            self.comments
                .iter()
                .map(|c| c.id)
                .filter(|id| *id != pending.comment && removed.contains(id)),
        );
        self.comments.retain(|c| !removed.contains(&c.id));
        self.reply.forget(&removed);
        tracing::debug!(comment = ?pending.comment, num_removed = removed_ids.len(), "deleted comment");
        Ok(removed_ids)
    }

    pub async fn delete<B: Backend + ?Sized>(
        &mut self,
        backend: &B,
        comment: CommentId,
    ) -> Result<Vec<CommentId>, Error> {
        let pending = self.begin_delete(comment)?;
        let res = backend.delete_comment(pending.comment).await;
        self.settle_delete(pending, res)
    }

    pub async fn dispatch<B: Backend + ?Sized>(
        &mut self,
        backend: &B,
        intent: Intent,
    ) -> Result<Outcome, Error> {
        tracing::trace!(?intent, "dispatching intent");
        match intent {
            Intent::Reply(comment) => self.reply(comment).map(Outcome::ReplyTarget),
            Intent::Add { content, parent_id } => self
                .add(backend, &content, parent_id)
                .await
                .map(Outcome::Added),
            Intent::Edit { comment, content } => self
                .edit(backend, comment, &content)
                .await
                .map(Outcome::Edited),
            Intent::ToggleLike(comment) => self
                .toggle_like(backend, comment)
                .await
                .map(Outcome::Liked),
            Intent::Delete(comment) => self.delete(backend, comment).await.map(Outcome::Deleted),
        }
    }
}

/// `root` plus every comment whose parent is, transitively, `root`. Scans
/// the list once per tree level, stopping at the first pass adding nothing.
fn descendants_and_self(comments: &[Comment], root: CommentId) -> HashSet<CommentId> {
    let mut removed = HashSet::from([root]);
    loop {
        let before = removed.len();
        for c in comments {
            if let Some(parent) = c.parent_id {
                if removed.contains(&parent) {
                    removed.insert(c.id);
                }
            }
        }
        if removed.len() == before {
            return removed;
        }
    }
}
