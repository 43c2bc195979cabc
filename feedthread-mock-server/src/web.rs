//! HTTP face of the mock server, speaking the same protocol as the real one

use std::{
    future::Future,
    net::{SocketAddr, TcpListener},
};

use anyhow::Context;
use axum::{
    async_trait,
    extract::{FromRequestParts, Path, State},
    http::{self, request, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use feedthread_api::{
    AuthToken, Comment, CommentEdit, CommentId, Error, NewComment, PostId, UserId, Uuid,
};

use crate::SharedServer;

pub struct HttpError(pub Error);

impl From<Error> for HttpError {
    fn from(e: Error) -> HttpError {
        HttpError(e)
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        tracing::info!("returning error to client: {}", self.0);
        (self.0.status_code(), self.0.contents()).into_response()
    }
}

/// Token sent with the request, if any. A malformed authorization header is
/// rejected outright rather than treated as anonymous.
pub struct Bearer(pub Option<AuthToken>);

#[async_trait]
impl<S: Sync> FromRequestParts<S> for Bearer {
    type Rejection = HttpError;

    async fn from_request_parts(req: &mut request::Parts, _state: &S) -> Result<Bearer, HttpError> {
        let auth = match req.headers.get(http::header::AUTHORIZATION) {
            None => return Ok(Bearer(None)),
            Some(auth) => auth,
        };
        let auth = auth.to_str().map_err(|_| Error::Unauthenticated)?;
        let mut auth = auth.split(' ');
        if !auth
            .next()
            .ok_or(Error::Unauthenticated)?
            .eq_ignore_ascii_case("bearer")
        {
            return Err(HttpError(Error::Unauthenticated));
        }
        let token = auth.next().ok_or(Error::Unauthenticated)?;
        if auth.next().is_some() {
            return Err(HttpError(Error::Unauthenticated));
        }
        let token = Uuid::try_from(token).map_err(|_| Error::Unauthenticated)?;
        Ok(Bearer(Some(AuthToken(token))))
    }
}

async fn whoami(
    State(server): State<SharedServer>,
    Bearer(tok): Bearer,
) -> Result<Json<UserId>, HttpError> {
    Ok(Json(server.lock().whoami(tok)?))
}

async fn list_comments(
    State(server): State<SharedServer>,
    Path(post): Path<Uuid>,
) -> Result<Json<Vec<Comment>>, HttpError> {
    Ok(Json(server.lock().list_comments(PostId(post))?))
}

async fn create_comment(
    State(server): State<SharedServer>,
    Bearer(tok): Bearer,
    Path(post): Path<Uuid>,
    Json(data): Json<NewComment>,
) -> Result<(StatusCode, Json<Comment>), HttpError> {
    let comment = server.lock().create_comment(tok, PostId(post), data)?;
    Ok((StatusCode::CREATED, Json(comment)))
}

async fn update_comment(
    State(server): State<SharedServer>,
    Bearer(tok): Bearer,
    Path(comment): Path<Uuid>,
    Json(data): Json<CommentEdit>,
) -> Result<Json<Comment>, HttpError> {
    Ok(Json(
        server
            .lock()
            .update_comment(tok, CommentId(comment), data)?,
    ))
}

async fn delete_comment(
    State(server): State<SharedServer>,
    Bearer(tok): Bearer,
    Path(comment): Path<Uuid>,
) -> Result<StatusCode, HttpError> {
    server.lock().delete_comment(tok, CommentId(comment))?;
    Ok(StatusCode::NO_CONTENT)
}

async fn like_comment(
    State(server): State<SharedServer>,
    Bearer(tok): Bearer,
    Path(comment): Path<Uuid>,
) -> Result<StatusCode, HttpError> {
    server.lock().like_comment(tok, CommentId(comment))?;
    Ok(StatusCode::CREATED)
}

async fn unlike_comment(
    State(server): State<SharedServer>,
    Bearer(tok): Bearer,
    Path(comment): Path<Uuid>,
) -> Result<StatusCode, HttpError> {
    server.lock().unlike_comment(tok, CommentId(comment))?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn router(server: SharedServer) -> Router {
    Router::new()
        .route("/api/whoami", get(whoami))
        .route(
            "/api/posts/:post_id/comments",
            get(list_comments).post(create_comment),
        )
        .route(
            "/api/comments/:comment_id",
            put(update_comment).delete(delete_comment),
        )
        .route(
            "/api/comments/:comment_id/like",
            post(like_comment).delete(unlike_comment),
        )
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(server)
}

/// Binds `addr` right away, returning the bound address (useful with port 0)
/// and the future serving requests
pub fn serve(
    server: SharedServer,
    addr: SocketAddr,
) -> anyhow::Result<(SocketAddr, impl Future<Output = anyhow::Result<()>>)> {
    let listener = TcpListener::bind(addr).with_context(|| format!("binding {addr}"))?;
    let addr = listener
        .local_addr()
        .context("recovering bound address")?;
    let app = axum::Server::from_tcp(listener)
        .context("setting up http server")?
        .serve(router(server).into_make_service());
    Ok((addr, async move { app.await.context("serving mock server") }))
}

/// Serves on a fresh localhost port in the background, for tests. Must be
/// called from within a tokio runtime.
pub fn spawn(server: SharedServer) -> anyhow::Result<SocketAddr> {
    let (addr, app) = serve(server, SocketAddr::from(([127, 0, 0, 1], 0)))?;
    tokio::spawn(async move {
        if let Err(err) = app.await {
            tracing::error!(?err, "mock server stopped");
        }
    });
    tracing::debug!(%addr, "mock server listening");
    Ok(addr)
}
