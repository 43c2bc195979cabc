use std::collections::HashSet;

use uuid::Uuid;

use crate::{PostId, Time, UserId};

// TODO: make below chrono::Duration once chrono's constructors are const
// Edits made within EDIT_GRACE_SECS after creation do not flag a comment as edited
pub const EDIT_GRACE_SECS: i64 = 5;

#[derive(
    Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
pub struct CommentId(pub Uuid);

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Comment {
    pub id: CommentId,
    pub post_id: PostId,
    pub author_id: UserId,

    #[serde(default)]
    pub author_name: String,

    /// Always trimmed and non-empty
    pub content: String,

    pub created_at: Time,
    pub updated_at: Time,
    #[serde(default)]
    pub parent_id: Option<CommentId>,

    #[serde(default)]
    pub liked_by: HashSet<UserId>,
}

impl Comment {
    pub fn new(
        id: CommentId,
        post_id: PostId,
        author_id: UserId,
        author_name: String,
        content: String,
        created_at: Time,
        parent_id: Option<CommentId>,
    ) -> Comment {
        Comment {
            id,
            post_id,
            author_id,
            author_name,
            content,
            created_at,
            updated_at: created_at,
            parent_id,
            liked_by: HashSet::new(),
        }
    }

    pub fn is_edited(&self) -> bool {
        self.updated_at - self.created_at > chrono::Duration::seconds(EDIT_GRACE_SECS)
    }

    pub fn is_liked_by(&self, user: &UserId) -> bool {
        self.liked_by.contains(user)
    }

    pub fn like_count(&self) -> usize {
        self.liked_by.len()
    }
}
