use std::{
    collections::{BTreeMap, HashSet},
    sync::Arc,
};

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use feedthread_api::{
    validate_content, AuthToken, Backend, Comment, CommentEdit, CommentId, Error, NewComment,
    PostId, Time, UserId, Uuid,
};
use parking_lot::Mutex;

pub mod web;

const CLOCK_START_SECS: i64 = 1_672_531_200;

pub type SharedServer = Arc<Mutex<MockServer>>;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Call {
    List(PostId),
    Create {
        post: PostId,
        parent_id: Option<CommentId>,
    },
    Update(CommentId),
    Delete(CommentId),
    Like(CommentId),
    Unlike(CommentId),
}

#[derive(Debug)]
struct MockUser {
    name: String,
    sessions: HashSet<AuthToken>,
}

/// In-memory comment server, enforcing the same rules as the real one.
///
/// Time only moves forward by one millisecond per write, or when the test
/// asks it to, so that timestamps are reproducible.
#[derive(Debug)]
pub struct MockServer {
    users: BTreeMap<UserId, MockUser>,
    comments: Vec<Comment>,
    now: Time,

    /// Number of upcoming calls that will fail before doing anything
    failures: usize,

    calls: Vec<Call>,
}

impl MockServer {
    pub fn new() -> MockServer {
        MockServer {
            users: BTreeMap::new(),
            comments: Vec::new(),
            now: Utc
                .timestamp_opt(CLOCK_START_SECS, 0)
                .single()
                .expect("mock clock start is a valid timestamp"),
            failures: 0,
            calls: Vec::new(),
        }
    }

    pub fn shared(self) -> SharedServer {
        Arc::new(Mutex::new(self))
    }

    pub fn add_user(&mut self, name: &str) -> (UserId, AuthToken) {
        let id = UserId(Uuid::new_v4());
        let tok = AuthToken(Uuid::new_v4());
        self.users.insert(
            id,
            MockUser {
                name: String::from(name),
                sessions: HashSet::from([tok]),
            },
        );
        (id, tok)
    }

    pub fn user_name(&self, user: &UserId) -> Option<&str> {
        self.users.get(user).map(|u| &u.name[..])
    }

    pub fn now(&self) -> Time {
        self.now
    }

    pub fn advance_clock(&mut self, d: Duration) {
        self.now = self.now + d;
    }

    /// Makes the next `n` comment calls fail with an unknown error
    pub fn fail_next(&mut self, n: usize) {
        self.failures = n;
    }

    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Comments of `post` as currently stored, without counting as a call
    pub fn stored_comments(&self, post: PostId) -> Vec<Comment> {
        self.comments
            .iter()
            .filter(|c| c.post_id == post)
            .cloned()
            .collect()
    }

    pub fn insert_comment(&mut self, comment: Comment) {
        self.comments.push(comment);
    }

    fn record(&mut self, call: Call) -> Result<(), Error> {
        tracing::trace!(?call, "mock server received call");
        self.calls.push(call);
        if self.failures > 0 {
            self.failures -= 1;
            return Err(Error::Unknown(String::from("injected failure")));
        }
        Ok(())
    }

    fn tick(&mut self) -> Time {
        self.now = self.now + Duration::milliseconds(1);
        self.now
    }

    fn resolve(&self, tok: Option<AuthToken>) -> Result<UserId, Error> {
        let tok = tok.ok_or(Error::Unauthenticated)?;
        for (id, u) in self.users.iter() {
            if u.sessions.contains(&tok) {
                return Ok(*id);
            }
        }
        Err(Error::Unauthenticated)
    }

    fn find(&self, comment: CommentId) -> Result<usize, Error> {
        self.comments
            .iter()
            .position(|c| c.id == comment)
            .ok_or(Error::NotFound(comment))
    }

    fn find_authored(&self, user: UserId, comment: CommentId) -> Result<usize, Error> {
        let pos = self.find(comment)?;
        if self.comments[pos].author_id != user {
            return Err(Error::PermissionDenied);
        }
        Ok(pos)
    }

    pub fn whoami(&self, tok: Option<AuthToken>) -> Result<UserId, Error> {
        self.resolve(tok)
    }

    pub fn list_comments(&mut self, post: PostId) -> Result<Vec<Comment>, Error> {
        self.record(Call::List(post))?;
        Ok(self.stored_comments(post))
    }

    pub fn create_comment(
        &mut self,
        tok: Option<AuthToken>,
        post: PostId,
        req: NewComment,
    ) -> Result<Comment, Error> {
        self.record(Call::Create {
            post,
            parent_id: req.parent_id,
        })?;
        let user = self.resolve(tok)?;
        let content = validate_content(&req.content)?;
        if let Some(parent) = req.parent_id {
            let pos = self.find(parent)?;
            if self.comments[pos].post_id != post {
                return Err(Error::NotFound(parent));
            }
        }
        let now = self.tick();
        let author_name = self.user_name(&user).unwrap_or_default().to_owned();
        let comment = Comment::new(
            CommentId(Uuid::new_v4()),
            post,
            user,
            author_name,
            content,
            now,
            req.parent_id,
        );
        self.comments.push(comment.clone());
        Ok(comment)
    }

    pub fn update_comment(
        &mut self,
        tok: Option<AuthToken>,
        comment: CommentId,
        req: CommentEdit,
    ) -> Result<Comment, Error> {
        self.record(Call::Update(comment))?;
        let user = self.resolve(tok)?;
        let pos = self.find_authored(user, comment)?;
        let content = validate_content(&req.content)?;
        let now = self.tick();
        let c = &mut self.comments[pos];
        c.content = content;
        c.updated_at = now;
        Ok(c.clone())
    }

    /// Only removes `comment` itself: its replies are left in place
    pub fn delete_comment(&mut self, tok: Option<AuthToken>, comment: CommentId) -> Result<(), Error> {
        self.record(Call::Delete(comment))?;
        let user = self.resolve(tok)?;
        let pos = self.find_authored(user, comment)?;
        self.comments.remove(pos);
        Ok(())
    }

    pub fn like_comment(&mut self, tok: Option<AuthToken>, comment: CommentId) -> Result<(), Error> {
        self.record(Call::Like(comment))?;
        let user = self.resolve(tok)?;
        let pos = self.find(comment)?;
        if !self.comments[pos].liked_by.insert(user) {
            return Err(Error::AlreadyLiked(comment));
        }
        Ok(())
    }

    /// Unliking a comment that was not liked is not an error
    pub fn unlike_comment(&mut self, tok: Option<AuthToken>, comment: CommentId) -> Result<(), Error> {
        self.record(Call::Unlike(comment))?;
        let user = self.resolve(tok)?;
        let pos = self.find(comment)?;
        self.comments[pos].liked_by.remove(&user);
        Ok(())
    }
}

impl Default for MockServer {
    fn default() -> MockServer {
        MockServer::new()
    }
}

/// `Backend` calling straight into a shared `MockServer`, as some user
#[derive(Clone, Debug)]
pub struct MockBackend {
    server: SharedServer,
    token: Option<AuthToken>,
}

impl MockBackend {
    pub fn new(server: SharedServer, token: Option<AuthToken>) -> MockBackend {
        MockBackend { server, token }
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn list_comments(&self, post: PostId) -> Result<Vec<Comment>, Error> {
        self.server.lock().list_comments(post)
    }

    async fn create_comment(
        &self,
        post: PostId,
        content: String,
        parent_id: Option<CommentId>,
    ) -> Result<Comment, Error> {
        self.server
            .lock()
            .create_comment(self.token, post, NewComment { content, parent_id })
    }

    async fn update_comment(&self, comment: CommentId, content: String) -> Result<Comment, Error> {
        self.server
            .lock()
            .update_comment(self.token, comment, CommentEdit { content })
    }

    async fn delete_comment(&self, comment: CommentId) -> Result<(), Error> {
        self.server.lock().delete_comment(self.token, comment)
    }

    async fn like_comment(&self, comment: CommentId) -> Result<(), Error> {
        self.server.lock().like_comment(self.token, comment)
    }

    async fn unlike_comment(&self, comment: CommentId) -> Result<(), Error> {
        self.server.lock().unlike_comment(self.token, comment)
    }
}
