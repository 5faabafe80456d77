//! Typed HTTP client for the meetapp API, used by the mobile dashboard.

use crate::app::sessions::SessionResponse;
use crate::domain::{MeetupView, Subscription, SubscriptionView};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

pub mod dashboard;

pub use dashboard::{Dashboard, DashboardMeetup};

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Not signed in")]
    NotSignedIn,
}

pub type ClientResult<T> = std::result::Result<T, ClientError>;

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// Source of listing data for the dashboard
#[async_trait]
pub trait MeetupFeed: Send + Sync {
    /// One page (1-based) of the meetups scheduled on the day of `date`
    async fn meetups(&self, date: DateTime<Utc>, page: u32) -> ClientResult<Vec<MeetupView>>;
    /// Ids of the meetups the signed-in user is subscribed to
    async fn subscribed_meetup_ids(&self) -> ClientResult<Vec<i64>>;
}

pub struct MeetappClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl MeetappClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorized(&self, request: RequestBuilder) -> ClientResult<RequestBuilder> {
        let token = self.token.as_deref().ok_or(ClientError::NotSignedIn)?;
        Ok(request.bearer_auth(token))
    }

    async fn check(response: Response) -> ClientResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = match response.json::<ErrorBody>().await {
            Ok(body) => body.error,
            Err(_) => status.canonical_reason().unwrap_or("unknown error").to_string(),
        };
        Err(ClientError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn json<T: DeserializeOwned>(request: RequestBuilder) -> ClientResult<T> {
        let response = Self::check(request.send().await?).await?;
        Ok(response.json().await?)
    }

    /// Sign in and keep the issued token for later requests
    pub async fn login(&mut self, email: &str, password: &str) -> ClientResult<SessionResponse> {
        let request = self
            .http
            .post(self.url("sessions"))
            .json(&json!({ "email": email, "password": password }));
        let session: SessionResponse = Self::json(request).await?;
        self.token = Some(session.token.clone());
        Ok(session)
    }

    pub async fn meetups(&self, date: DateTime<Utc>, page: u32) -> ClientResult<Vec<MeetupView>> {
        let request = self.authorized(self.http.get(self.url("meetup")))?.query(&[
            ("date", date.to_rfc3339_opts(SecondsFormat::Millis, true)),
            ("page", page.to_string()),
        ]);
        Self::json(request).await
    }

    pub async fn subscriptions(&self) -> ClientResult<Vec<SubscriptionView>> {
        let request = self.authorized(self.http.get(self.url("subscription")))?;
        Self::json(request).await
    }

    pub async fn subscribe(&self, meetup_id: i64) -> ClientResult<Subscription> {
        let request = self
            .authorized(self.http.post(self.url("subscriptions")))?
            .json(&json!({ "meetup_id": meetup_id }));
        Self::json(request).await
    }

    pub async fn unsubscribe(&self, subscription_id: i64) -> ClientResult<()> {
        let request = self.authorized(
            self.http
                .delete(self.url(&format!("subscriptions/{subscription_id}"))),
        )?;
        Self::check(request.send().await?).await?;
        Ok(())
    }
}

#[async_trait]
impl MeetupFeed for MeetappClient {
    async fn meetups(&self, date: DateTime<Utc>, page: u32) -> ClientResult<Vec<MeetupView>> {
        MeetappClient::meetups(self, date, page).await
    }

    async fn subscribed_meetup_ids(&self) -> ClientResult<Vec<i64>> {
        let subscriptions = self.subscriptions().await?;
        Ok(subscriptions.into_iter().map(|s| s.meetup.id).collect())
    }
}
