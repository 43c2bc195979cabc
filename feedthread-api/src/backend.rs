use async_trait::async_trait;

use crate::{Comment, CommentId, Error, PostId};

/// The durable side of a discussion
#[async_trait]
pub trait Backend {
    async fn list_comments(&self, post: PostId) -> Result<Vec<Comment>, Error>;

    async fn create_comment(
        &self,
        post: PostId,
        content: String,
        parent_id: Option<CommentId>,
    ) -> Result<Comment, Error>;

    async fn update_comment(&self, comment: CommentId, content: String) -> Result<Comment, Error>;

    /// Deletes exactly this comment, never its replies
    async fn delete_comment(&self, comment: CommentId) -> Result<(), Error>;

    /// Fails with `Error::AlreadyLiked` if the acting user already likes it
    async fn like_comment(&self, comment: CommentId) -> Result<(), Error>;

    async fn unlike_comment(&self, comment: CommentId) -> Result<(), Error>;
}
