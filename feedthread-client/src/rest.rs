use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};

use crate::api::{
    self, AuthToken, Backend, Comment, CommentEdit, CommentId, NewComment, PostId, UserId,
};

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RestConfig {
    pub host: String,
    pub token: Option<AuthToken>,
    pub timeout: Duration,
}

impl RestConfig {
    pub fn new(host: String, token: Option<AuthToken>) -> RestConfig {
        RestConfig {
            host,
            token,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug)]
pub struct RestBackend {
    client: reqwest::Client,
    config: RestConfig,
}

impl RestBackend {
    pub fn new(mut config: RestConfig) -> anyhow::Result<RestBackend> {
        let host_len = config.host.trim_end_matches('/').len();
        config.host.truncate(host_len);
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("building http client")?;
        Ok(RestBackend { client, config })
    }

    pub fn config(&self) -> &RestConfig {
        &self.config
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        tracing::trace!(%method, path, "sending request");
        let req = self
            .client
            .request(method, format!("{}/api/{}", self.config.host, path));
        match self.config.token {
            Some(token) => req.bearer_auth(token.0),
            None => req,
        }
    }

    /// `comment` is the comment the request is about, used to rebuild errors
    /// from bare status codes
    async fn send(req: RequestBuilder, comment: Option<CommentId>) -> Result<Response, api::Error> {
        let resp = req
            .send()
            .await
            .map_err(|e| api::Error::Unknown(format!("sending request: {e}")))?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp
            .bytes()
            .await
            .map_err(|e| api::Error::Unknown(format!("receiving error body: {e}")))?;
        let err = api::Error::from_response(status, &body, comment);
        tracing::debug!(?status, %err, "server refused request");
        Err(err)
    }

    async fn fetch<R>(req: RequestBuilder, comment: Option<CommentId>) -> Result<R, api::Error>
    where
        R: for<'de> serde::Deserialize<'de>,
    {
        Self::send(req, comment)
            .await?
            .json()
            .await
            .map_err(|e| api::Error::Unknown(format!("parsing server response: {e}")))
    }

    pub async fn whoami(&self) -> Result<UserId, api::Error> {
        Self::fetch(self.request(Method::GET, "whoami"), None).await
    }
}

#[async_trait]
impl Backend for RestBackend {
    async fn list_comments(&self, post: PostId) -> Result<Vec<Comment>, api::Error> {
        let path = format!("posts/{}/comments", post.0);
        Self::fetch(self.request(Method::GET, &path), None).await
    }

    async fn create_comment(
        &self,
        post: PostId,
        content: String,
        parent_id: Option<CommentId>,
    ) -> Result<Comment, api::Error> {
        let path = format!("posts/{}/comments", post.0);
        let req = self
            .request(Method::POST, &path)
            .json(&NewComment { content, parent_id });
        Self::fetch(req, parent_id).await
    }

    async fn update_comment(&self, comment: CommentId, content: String) -> Result<Comment, api::Error> {
        let path = format!("comments/{}", comment.0);
        let req = self
            .request(Method::PUT, &path)
            .json(&CommentEdit { content });
        Self::fetch(req, Some(comment)).await
    }

    async fn delete_comment(&self, comment: CommentId) -> Result<(), api::Error> {
        let path = format!("comments/{}", comment.0);
        Self::send(self.request(Method::DELETE, &path), Some(comment)).await?;
        Ok(())
    }

    async fn like_comment(&self, comment: CommentId) -> Result<(), api::Error> {
        let path = format!("comments/{}/like", comment.0);
        Self::send(self.request(Method::POST, &path), Some(comment)).await?;
        Ok(())
    }

    async fn unlike_comment(&self, comment: CommentId) -> Result<(), api::Error> {
        let path = format!("comments/{}/like", comment.0);
        Self::send(self.request(Method::DELETE, &path), Some(comment)).await?;
        Ok(())
    }
}
