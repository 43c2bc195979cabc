use std::str::FromStr;

use anyhow::{anyhow, Context};
use serde_json::json;
use uuid::Uuid;

use crate::CommentId;

#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("Unknown error: {0}")]
    Unknown(String),

    #[error("Not authenticated")]
    Unauthenticated,

    #[error("Permission denied")]
    PermissionDenied,

    #[error("Comment content must not be empty")]
    InvalidContent,

    #[error("Null byte in string is not allowed {0:?}")]
    NullByteInString(String),

    #[error("Comment not found {0:?}")]
    NotFound(CommentId),

    #[error("Comment already liked {0:?}")]
    AlreadyLiked(CommentId),
}

impl Error {
    pub fn status_code(&self) -> http::StatusCode {
        use http::StatusCode;
        match self {
            Error::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Unauthenticated => StatusCode::UNAUTHORIZED,
            Error::PermissionDenied => StatusCode::FORBIDDEN,
            Error::InvalidContent => StatusCode::BAD_REQUEST,
            Error::NullByteInString(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::AlreadyLiked(_) => StatusCode::CONFLICT,
        }
    }

    pub fn contents(&self) -> Vec<u8> {
        serde_json::to_vec(&match self {
            Error::Unknown(msg) => json!({
                "message": msg,
                "type": "unknown",
            }),
            Error::Unauthenticated => json!({
                "message": "not authenticated",
                "type": "unauthenticated",
            }),
            Error::PermissionDenied => json!({
                "message": "permission denied",
                "type": "permission-denied",
            }),
            Error::InvalidContent => json!({
                "message": "comment content must not be empty",
                "type": "invalid-content",
            }),
            Error::NullByteInString(s) => json!({
                "message": "there was a null byte in argument string",
                "type": "null-byte",
                "string": s,
            }),
            Error::NotFound(c) => json!({
                "message": "comment not found",
                "type": "not-found",
                "comment": c.0,
            }),
            Error::AlreadyLiked(c) => json!({
                "message": "comment already liked",
                "type": "already-liked",
                "comment": c.0,
            }),
        })
        .expect("serializing error contents")
    }

    pub fn parse(body: &[u8]) -> anyhow::Result<Error> {
        let data: serde_json::Value =
            serde_json::from_slice(body).context("parsing error contents")?;
        let comment = || -> anyhow::Result<CommentId> {
            data.get("comment")
                .and_then(|c| c.as_str())
                .and_then(|c| Uuid::from_str(c).ok())
                .map(CommentId)
                .ok_or_else(|| anyhow!("error is about a comment but has no proper comment id"))
        };
        Ok(
            match data
                .get("type")
                .and_then(|t| t.as_str())
                .ok_or_else(|| anyhow!("error type is not a string"))?
            {
                "unknown" => Error::Unknown(String::from(
                    data.get("message")
                        .and_then(|msg| msg.as_str())
                        .unwrap_or(""),
                )),
                "unauthenticated" => Error::Unauthenticated,
                "permission-denied" => Error::PermissionDenied,
                "invalid-content" => Error::InvalidContent,
                "null-byte" => Error::NullByteInString(String::from(
                    data.get("string").and_then(|s| s.as_str()).ok_or_else(|| {
                        anyhow!("error is a null-byte-in-string without a string")
                    })?,
                )),
                "not-found" => Error::NotFound(comment()?),
                "already-liked" => Error::AlreadyLiked(comment()?),
                _ => return Err(anyhow!("error contents has unknown type")),
            },
        )
    }

    /// Rebuilds the error from an HTTP response, falling back to the status
    /// code when the body is not one of ours (eg. a proxy error page).
    pub fn from_response(status: http::StatusCode, body: &[u8], comment: Option<CommentId>) -> Error {
        use http::StatusCode;
        match Error::parse(body) {
            Ok(err) => err,
            Err(parse_err) => {
                tracing::debug!(?status, ?parse_err, "error body is not parseable");
                match (status, comment) {
                    (StatusCode::UNAUTHORIZED, _) => Error::Unauthenticated,
                    (StatusCode::FORBIDDEN, _) => Error::PermissionDenied,
                    (StatusCode::BAD_REQUEST, _) => Error::InvalidContent,
                    (StatusCode::NOT_FOUND, Some(c)) => Error::NotFound(c),
                    (StatusCode::CONFLICT, Some(c)) => Error::AlreadyLiked(c),
                    _ => Error::Unknown(format!("server answered {status}")),
                }
            }
        }
    }
}
