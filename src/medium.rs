//! # Medium client
//!
//! Implements the core [`Publisher`] trait against the Medium REST API. Only
//! the three endpoints the migration needs are covered:
//!
//! - `GET /me`
//! - `GET /users/{userId}/publications`
//! - `POST /publications/{publicationId}/posts`
//!
//! Every response is an envelope holding either `data` or an `errors` array.
//! An `errors` array always becomes [`PublishError::Rejected`] with the
//! platform's messages, whatever the HTTP status.

use async_trait::async_trait;
use blog_migrate_core::contract::{NewPost, Publication, PublishedPost, Publisher, User};
use blog_migrate_core::error::PublishError;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::load_config::medium_token_from_env;

pub struct MediumClient {
    http: Client,
    api_base: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
    #[serde(default)]
    code: Option<i64>,
}

impl MediumClient {
    pub fn new(api_base: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    /// Build a client with the token from `MEDIUM_ACCESS_TOKEN`.
    pub fn new_from_env(api_base: &str) -> Result<Self, blog_migrate_core::error::ConfigError> {
        let token = medium_token_from_env()?;
        tracing::info!(api_base, "Initialized MediumClient from environment");
        Ok(Self::new(api_base, token))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, PublishError> {
        let response = request
            .bearer_auth(&self.token)
            .header(reqwest::header::ACCEPT, "application/json")
            .header(reqwest::header::ACCEPT_CHARSET, "utf-8")
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = ?e, "[PUBLISH] Request to platform failed");
                PublishError::Transport(e.to_string())
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PublishError::Transport(e.to_string()))?;

        match serde_json::from_str::<Envelope<T>>(&body) {
            Ok(envelope) if !envelope.errors.is_empty() => {
                for e in &envelope.errors {
                    tracing::error!(code = ?e.code, message = %e.message, status = %status, "[PUBLISH] Platform returned error");
                }
                Err(PublishError::Rejected {
                    messages: envelope.errors.into_iter().map(|e| e.message).collect(),
                })
            }
            Ok(Envelope {
                data: Some(data), ..
            }) if status.is_success() => Ok(data),
            Ok(_) | Err(_) => {
                tracing::error!(status = %status, body = %body, "[PUBLISH] Unexpected platform response");
                Err(PublishError::Http {
                    status: status.as_u16(),
                    body,
                })
            }
        }
    }
}

#[async_trait]
impl Publisher for MediumClient {
    async fn create_post(
        &self,
        publication_id: &str,
        post: &NewPost,
    ) -> Result<PublishedPost, PublishError> {
        tracing::info!(publication_id, title = %post.title, "[PUBLISH] Creating post");
        let request = self
            .http
            .post(self.url(&format!("/publications/{publication_id}/posts")))
            .json(post);
        let created: PublishedPost = self.send(request).await?;
        tracing::info!(id = %created.id, url = %created.url, "[PUBLISH] Post created");
        Ok(created)
    }

    async fn current_user(&self) -> Result<User, PublishError> {
        tracing::info!("[PUBLISH] Fetching current user");
        self.send(self.http.get(self.url("/me"))).await
    }

    async fn publications(&self, user_id: &str) -> Result<Vec<Publication>, PublishError> {
        tracing::info!(user_id, "[PUBLISH] Listing publications");
        let publications: Vec<Publication> = self
            .send(self.http.get(self.url(&format!("/users/{user_id}/publications"))))
            .await?;
        tracing::info!(count = publications.len(), "[PUBLISH] Fetched publications");
        Ok(publications)
    }
}
