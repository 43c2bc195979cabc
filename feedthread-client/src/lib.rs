mod discussion;
pub use discussion::{
    Discussion, Intent, Outcome, PendingAdd, PendingDelete, PendingEdit, PendingLike, PendingLoad,
    Phase,
};

mod error;
pub use error::{AuthError, Error, Notice, NoticeKind, ValidationError};

mod reply;
pub use reply::ReplySession;

pub mod render;

mod rest;
pub use rest::{RestBackend, RestConfig, DEFAULT_TIMEOUT_SECS};

mod tree;
pub use tree::{Forest, Node, Walk};

pub mod api {
    pub use feedthread_api::*;
}
