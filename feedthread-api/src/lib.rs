use chrono::Utc;

pub use uuid::{uuid, Uuid};
pub type Time = chrono::DateTime<Utc>;

pub const STUB_UUID: Uuid = uuid!("ffffffff-ffff-ffff-ffff-ffffffffffff");

mod backend;
pub use backend::Backend;

mod comment;
pub use comment::{Comment, CommentId, EDIT_GRACE_SECS};

mod error;
pub use error::Error;

mod post;
pub use post::PostId;

mod request;
pub use request::{CommentEdit, NewComment};

mod user;
pub use user::{AuthToken, UserId};

/// Trims `content` and checks it can be stored as a comment body
pub fn validate_content(content: &str) -> Result<String, Error> {
    let content = content.trim();
    if content.is_empty() {
        return Err(Error::InvalidContent);
    }
    if content.contains('\0') {
        return Err(Error::NullByteInString(String::from(content)));
    }
    Ok(String::from(content))
}
