use crate::domain::*;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub mod in_memory;
pub mod sqlite;

pub use in_memory::InMemoryStorage;
pub use sqlite::SqliteStorage;

/// Storage trait for persisting meetapp data
#[async_trait]
pub trait Storage: Send + Sync {
    // User operations
    async fn create_user(&self, user: NewUser) -> Result<User>;
    async fn find_user(&self, id: i64) -> Result<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn update_user(&self, user: &User) -> Result<()>;

    // Session operations
    async fn create_session(&self, session: &Session) -> Result<()>;
    async fn find_session(&self, token_hash: &str) -> Result<Option<Session>>;

    // File operations
    async fn create_file(&self, file: NewFile) -> Result<File>;
    async fn find_file(&self, id: i64) -> Result<Option<File>>;

    // Meetup operations
    async fn create_meetup(&self, meetup: NewMeetup) -> Result<Meetup>;
    async fn find_meetup(&self, id: i64) -> Result<Option<Meetup>>;
    async fn update_meetup(&self, meetup: &Meetup) -> Result<()>;
    /// Removes the meetup together with its subscriptions
    async fn delete_meetup(&self, id: i64) -> Result<()>;
    /// Meetups with `from <= schedule < to`, schedule ascending
    async fn meetups_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Meetup>>;
    async fn meetups_by_owner(&self, user_id: i64) -> Result<Vec<Meetup>>;

    // Subscription operations
    async fn find_subscription(&self, id: i64) -> Result<Option<Subscription>>;
    /// Checks for a duplicate or a same-schedule subscription and inserts
    /// the new one in a single step.
    async fn create_subscription(
        &self,
        user_id: i64,
        meetup: &Meetup,
    ) -> Result<SubscriptionOutcome>;
    /// Subscriptions whose meetup is scheduled strictly after `after`,
    /// ordered by meetup schedule ascending
    async fn upcoming_subscriptions(
        &self,
        user_id: i64,
        after: DateTime<Utc>,
    ) -> Result<Vec<(Subscription, Meetup)>>;
    async fn delete_subscription(&self, id: i64) -> Result<()>;
}
