//! Records persisted by the storage layer and the JSON shapes the API returns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

/// An uploaded banner image
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct File {
    pub id: i64,
    pub name: String,
    pub path: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewFile {
    pub name: String,
    pub path: String,
}

/// A scheduled event owned by a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meetup {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub location: String,
    pub schedule: DateTime<Utc>,
    pub user_id: i64,
    pub banner_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Meetup {
    /// Whether the scheduled time has already passed at `now`.
    pub fn is_past(&self, now: DateTime<Utc>) -> bool {
        self.schedule < now
    }
}

#[derive(Debug, Clone)]
pub struct NewMeetup {
    pub title: String,
    pub description: String,
    pub location: String,
    pub schedule: DateTime<Utc>,
    pub user_id: i64,
    pub banner_id: Option<i64>,
}

/// A user's intent to attend a meetup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: i64,
    pub user_id: i64,
    pub meetup_id: i64,
    pub created_at: DateTime<Utc>,
}

/// Result of the atomic duplicate/conflict check and insert
#[derive(Debug, Clone, PartialEq)]
pub enum SubscriptionOutcome {
    Created(Subscription),
    AlreadySubscribed,
    ScheduleConflict,
}

/// A login token; only the digest of the bearer token is kept
#[derive(Debug, Clone)]
pub struct Session {
    pub token_hash: String,
    pub user_id: i64,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: i64,
    pub name: String,
    pub email: String,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnerView {
    pub name: String,
    pub email: String,
}

impl From<&User> for OwnerView {
    fn from(user: &User) -> Self {
        Self {
            name: user.name.clone(),
            email: user.email.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileView {
    pub id: i64,
    pub name: String,
    pub path: String,
    pub url: String,
}

impl FileView {
    pub fn new(file: &File, public_url: &str) -> Self {
        Self {
            id: file.id,
            name: file.name.clone(),
            path: file.path.clone(),
            url: file_url(public_url, &file.path),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BannerView {
    pub path: String,
    pub url: String,
}

impl BannerView {
    pub fn new(file: &File, public_url: &str) -> Self {
        Self {
            path: file.path.clone(),
            url: file_url(public_url, &file.path),
        }
    }
}

/// Public address of an uploaded file
pub fn file_url(public_url: &str, path: &str) -> String {
    format!("{}/uploads/{}", public_url.trim_end_matches('/'), path)
}

/// Meetup as returned by the listing and detail routes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeetupView {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub location: String,
    pub schedule: DateTime<Utc>,
    pub past: bool,
    pub user_id: i64,
    pub banner_id: Option<i64>,
    pub meetup_banner: Option<BannerView>,
    pub owner: Option<OwnerView>,
}

/// Meetup projection nested inside a subscription listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscribedMeetupView {
    pub id: i64,
    pub past: bool,
    pub title: String,
    pub description: String,
    pub location: String,
    pub schedule: DateTime<Utc>,
    pub meetup_banner: Option<BannerView>,
    pub owner: Option<OwnerView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionView {
    pub id: i64,
    #[serde(rename = "Meetup")]
    pub meetup: SubscribedMeetupView,
}
