use crate::api::{self, CommentId};

#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("a comment cannot be empty")]
    EmptyContent,

    #[error("a comment cannot contain null bytes")]
    NullByte,
}

#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum AuthError {
    #[error("you need to be signed in")]
    Unauthenticated,

    #[error("only the author of comment {0:?} can do this")]
    NotAuthor(CommentId),
}

#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("comment {0:?} is not in this discussion")]
    UnknownComment(CommentId),

    #[error("the discussion is not loaded yet")]
    NotLoaded,

    #[error("the server could not save this: {0}")]
    Durability(#[source] api::Error),
}

impl Error {
    /// Whether this error came back from the backend, after local state was
    /// possibly touched. All other errors are raised before any change.
    pub fn is_durability(&self) -> bool {
        matches!(self, Error::Durability(_))
    }
}

pub(crate) fn validate(content: &str) -> Result<String, ValidationError> {
    match api::validate_content(content) {
        Ok(content) => Ok(content),
        Err(api::Error::NullByteInString(_)) => Err(ValidationError::NullByte),
        Err(_) => Err(ValidationError::EmptyContent),
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NoticeKind {
    /// The intent was refused locally, nothing was sent
    Rejected,

    /// The backend refused the intent, local state was restored
    Failed,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl From<&Error> for Notice {
    fn from(e: &Error) -> Notice {
        Notice {
            kind: match e.is_durability() {
                true => NoticeKind::Failed,
                false => NoticeKind::Rejected,
            },
            message: e.to_string(),
        }
    }
}
