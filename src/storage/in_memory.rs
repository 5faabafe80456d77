use super::Storage;
use crate::domain::*;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

#[derive(Default)]
struct Tables {
    next_id: i64,
    users: BTreeMap<i64, User>,
    sessions: HashMap<String, Session>,
    files: BTreeMap<i64, File>,
    meetups: BTreeMap<i64, Meetup>,
    subscriptions: BTreeMap<i64, Subscription>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-memory storage implementation for development/testing
///
/// All tables sit behind one lock so multi-step operations such as
/// [`Storage::create_subscription`] are atomic.
#[derive(Default)]
pub struct InMemoryStorage {
    tables: Mutex<Tables>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn by_schedule(a: &Meetup, b: &Meetup) -> std::cmp::Ordering {
    a.schedule.cmp(&b.schedule).then(a.id.cmp(&b.id))
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn create_user(&self, user: NewUser) -> Result<User> {
        let mut tables = self.tables();
        if tables.users.values().any(|u| u.email == user.email) {
            return Err(AppError::Storage {
                message: format!("email {} already registered", user.email),
            });
        }

        let now = Utc::now();
        let id = tables.next_id();
        let user = User {
            id,
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(id, user.clone());

        debug!("Created user {} with id {}", user.email, id);
        Ok(user)
    }

    async fn find_user(&self, id: i64) -> Result<Option<User>> {
        Ok(self.tables().users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self
            .tables()
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn update_user(&self, user: &User) -> Result<()> {
        let mut tables = self.tables();
        if !tables.users.contains_key(&user.id) {
            return Err(AppError::Storage {
                message: format!("cannot update missing user {}", user.id),
            });
        }
        tables.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn create_session(&self, session: &Session) -> Result<()> {
        let mut tables = self.tables();
        let before = tables.sessions.len();
        tables
            .sessions
            .retain(|_, s| s.expires_at > session.created_at);
        let expired = before - tables.sessions.len();
        if expired > 0 {
            debug!("Removed {} expired sessions", expired);
        }
        tables
            .sessions
            .insert(session.token_hash.clone(), session.clone());
        Ok(())
    }

    async fn find_session(&self, token_hash: &str) -> Result<Option<Session>> {
        Ok(self.tables().sessions.get(token_hash).cloned())
    }

    async fn create_file(&self, file: NewFile) -> Result<File> {
        let mut tables = self.tables();
        let id = tables.next_id();
        let file = File {
            id,
            name: file.name,
            path: file.path,
            created_at: Utc::now(),
        };
        tables.files.insert(id, file.clone());

        debug!("Created file {} with id {}", file.path, id);
        Ok(file)
    }

    async fn find_file(&self, id: i64) -> Result<Option<File>> {
        Ok(self.tables().files.get(&id).cloned())
    }

    async fn create_meetup(&self, meetup: NewMeetup) -> Result<Meetup> {
        let mut tables = self.tables();
        let now = Utc::now();
        let id = tables.next_id();
        let meetup = Meetup {
            id,
            title: meetup.title,
            description: meetup.description,
            location: meetup.location,
            schedule: meetup.schedule,
            user_id: meetup.user_id,
            banner_id: meetup.banner_id,
            created_at: now,
            updated_at: now,
        };
        tables.meetups.insert(id, meetup.clone());

        debug!("Created meetup {} with id {}", meetup.title, id);
        Ok(meetup)
    }

    async fn find_meetup(&self, id: i64) -> Result<Option<Meetup>> {
        Ok(self.tables().meetups.get(&id).cloned())
    }

    async fn update_meetup(&self, meetup: &Meetup) -> Result<()> {
        let mut tables = self.tables();
        if !tables.meetups.contains_key(&meetup.id) {
            return Err(AppError::Storage {
                message: format!("cannot update missing meetup {}", meetup.id),
            });
        }
        tables.meetups.insert(meetup.id, meetup.clone());
        Ok(())
    }

    async fn delete_meetup(&self, id: i64) -> Result<()> {
        let mut tables = self.tables();
        tables.meetups.remove(&id);
        tables.subscriptions.retain(|_, s| s.meetup_id != id);
        debug!("Deleted meetup {}", id);
        Ok(())
    }

    async fn meetups_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Meetup>> {
        let tables = self.tables();
        let mut meetups: Vec<Meetup> = tables
            .meetups
            .values()
            .filter(|m| m.schedule >= from && m.schedule < to)
            .cloned()
            .collect();
        meetups.sort_by(by_schedule);
        Ok(meetups.into_iter().skip(offset).take(limit).collect())
    }

    async fn meetups_by_owner(&self, user_id: i64) -> Result<Vec<Meetup>> {
        let tables = self.tables();
        let mut meetups: Vec<Meetup> = tables
            .meetups
            .values()
            .filter(|m| m.user_id == user_id)
            .cloned()
            .collect();
        meetups.sort_by(by_schedule);
        Ok(meetups)
    }

    async fn find_subscription(&self, id: i64) -> Result<Option<Subscription>> {
        Ok(self.tables().subscriptions.get(&id).cloned())
    }

    async fn create_subscription(
        &self,
        user_id: i64,
        meetup: &Meetup,
    ) -> Result<SubscriptionOutcome> {
        let mut tables = self.tables();

        let mine: Vec<&Subscription> = tables
            .subscriptions
            .values()
            .filter(|s| s.user_id == user_id)
            .collect();

        if mine.iter().any(|s| s.meetup_id == meetup.id) {
            return Ok(SubscriptionOutcome::AlreadySubscribed);
        }

        let conflict = mine.iter().any(|s| {
            tables
                .meetups
                .get(&s.meetup_id)
                .is_some_and(|m| m.schedule == meetup.schedule)
        });
        if conflict {
            return Ok(SubscriptionOutcome::ScheduleConflict);
        }

        let id = tables.next_id();
        let subscription = Subscription {
            id,
            user_id,
            meetup_id: meetup.id,
            created_at: Utc::now(),
        };
        tables.subscriptions.insert(id, subscription.clone());

        debug!("User {} subscribed to meetup {}", user_id, meetup.id);
        Ok(SubscriptionOutcome::Created(subscription))
    }

    async fn upcoming_subscriptions(
        &self,
        user_id: i64,
        after: DateTime<Utc>,
    ) -> Result<Vec<(Subscription, Meetup)>> {
        let tables = self.tables();
        let mut upcoming: Vec<(Subscription, Meetup)> = tables
            .subscriptions
            .values()
            .filter(|s| s.user_id == user_id)
            .filter_map(|s| {
                tables
                    .meetups
                    .get(&s.meetup_id)
                    .filter(|m| m.schedule > after)
                    .map(|m| (s.clone(), m.clone()))
            })
            .collect();
        upcoming.sort_by(|(_, a), (_, b)| by_schedule(a, b));
        Ok(upcoming)
    }

    async fn delete_subscription(&self, id: i64) -> Result<()> {
        self.tables().subscriptions.remove(&id);
        debug!("Deleted subscription {}", id);
        Ok(())
    }
}
