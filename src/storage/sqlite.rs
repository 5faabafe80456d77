//! SQLite-backed storage.
//!
//! Timestamps are stored as unix milliseconds. One connection is shared behind
//! a mutex; the subscription check-and-insert runs inside an immediate
//! transaction.

use super::Storage;
use crate::domain::*;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

const MIGRATION: &str = include_str!("../../migrations/001_create_meetapp.sql");

const USER_COLUMNS: &str = "id, name, email, password_hash, created_at, updated_at";
const FILE_COLUMNS: &str = "id, name, path, created_at";
const MEETUP_COLUMNS: &str =
    "id, title, description, location, schedule, user_id, banner_id, created_at, updated_at";

pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Open (or create) the database file and apply migrations
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        info!("Opening SQLite database at {}", path.display());

        let conn = Connection::open(path)?;
        conn.query_row("PRAGMA journal_mode=WAL", [], |_| Ok(()))?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let storage = Self {
            conn: Mutex::new(conn),
        };
        storage.run_migrations()?;
        Ok(storage)
    }

    pub fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations...");
        self.with_conn(|conn| conn.execute_batch(MIGRATION))?;
        info!("Database migrations completed successfully");
        Ok(())
    }

    fn with_conn<T>(&self, f: impl FnOnce(&mut Connection) -> rusqlite::Result<T>) -> Result<T> {
        let mut conn = self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(f(&mut conn)?)
    }
}

fn millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

fn timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let ms: i64 = row.get(idx)?;
    DateTime::from_timestamp_millis(ms).ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, ms))
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        created_at: timestamp(row, 4)?,
        updated_at: timestamp(row, 5)?,
    })
}

fn file_from_row(row: &Row<'_>) -> rusqlite::Result<File> {
    Ok(File {
        id: row.get(0)?,
        name: row.get(1)?,
        path: row.get(2)?,
        created_at: timestamp(row, 3)?,
    })
}

/// Reads meetup columns starting at `base`
fn meetup_at(row: &Row<'_>, base: usize) -> rusqlite::Result<Meetup> {
    Ok(Meetup {
        id: row.get(base)?,
        title: row.get(base + 1)?,
        description: row.get(base + 2)?,
        location: row.get(base + 3)?,
        schedule: timestamp(row, base + 4)?,
        user_id: row.get(base + 5)?,
        banner_id: row.get(base + 6)?,
        created_at: timestamp(row, base + 7)?,
        updated_at: timestamp(row, base + 8)?,
    })
}

fn meetup_from_row(row: &Row<'_>) -> rusqlite::Result<Meetup> {
    meetup_at(row, 0)
}

fn subscription_from_row(row: &Row<'_>) -> rusqlite::Result<Subscription> {
    Ok(Subscription {
        id: row.get(0)?,
        user_id: row.get(1)?,
        meetup_id: row.get(2)?,
        created_at: timestamp(row, 3)?,
    })
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn create_user(&self, user: NewUser) -> Result<User> {
        let now = Utc::now();
        let id = self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (name, email, password_hash, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?4)",
                params![user.name, user.email, user.password_hash, millis(now)],
            )?;
            Ok(conn.last_insert_rowid())
        })?;

        debug!("Created user {} with id {}", user.email, id);
        Ok(User {
            id,
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            created_at: now,
            updated_at: now,
        })
    }

    async fn find_user(&self, id: i64) -> Result<Option<User>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id],
                user_from_row,
            )
            .optional()
        })
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
                params![email],
                user_from_row,
            )
            .optional()
        })
    }

    async fn update_user(&self, user: &User) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET name = ?2, email = ?3, password_hash = ?4, updated_at = ?5 WHERE id = ?1",
                params![
                    user.id,
                    user.name,
                    user.email,
                    user.password_hash,
                    millis(user.updated_at)
                ],
            )
        })?;
        Ok(())
    }

    async fn create_session(&self, session: &Session) -> Result<()> {
        self.with_conn(|conn| {
            let expired = conn.execute(
                "DELETE FROM sessions WHERE expires_at <= ?1",
                params![millis(session.created_at)],
            )?;
            if expired > 0 {
                debug!("Removed {} expired sessions", expired);
            }
            conn.execute(
                "INSERT INTO sessions (token_hash, user_id, expires_at, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![
                    session.token_hash,
                    session.user_id,
                    millis(session.expires_at),
                    millis(session.created_at)
                ],
            )
        })?;
        Ok(())
    }

    async fn find_session(&self, token_hash: &str) -> Result<Option<Session>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT token_hash, user_id, expires_at, created_at FROM sessions WHERE token_hash = ?1",
                params![token_hash],
                |row| {
                    Ok(Session {
                        token_hash: row.get(0)?,
                        user_id: row.get(1)?,
                        expires_at: timestamp(row, 2)?,
                        created_at: timestamp(row, 3)?,
                    })
                },
            )
            .optional()
        })
    }

    async fn create_file(&self, file: NewFile) -> Result<File> {
        let now = Utc::now();
        let id = self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO files (name, path, created_at) VALUES (?1, ?2, ?3)",
                params![file.name, file.path, millis(now)],
            )?;
            Ok(conn.last_insert_rowid())
        })?;

        debug!("Created file {} with id {}", file.path, id);
        Ok(File {
            id,
            name: file.name,
            path: file.path,
            created_at: now,
        })
    }

    async fn find_file(&self, id: i64) -> Result<Option<File>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {FILE_COLUMNS} FROM files WHERE id = ?1"),
                params![id],
                file_from_row,
            )
            .optional()
        })
    }

    async fn create_meetup(&self, meetup: NewMeetup) -> Result<Meetup> {
        let now = Utc::now();
        let id = self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO meetups (title, description, location, schedule, user_id, banner_id, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
                params![
                    meetup.title,
                    meetup.description,
                    meetup.location,
                    millis(meetup.schedule),
                    meetup.user_id,
                    meetup.banner_id,
                    millis(now)
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })?;

        debug!("Created meetup {} with id {}", meetup.title, id);
        Ok(Meetup {
            id,
            title: meetup.title,
            description: meetup.description,
            location: meetup.location,
            schedule: meetup.schedule,
            user_id: meetup.user_id,
            banner_id: meetup.banner_id,
            created_at: now,
            updated_at: now,
        })
    }

    async fn find_meetup(&self, id: i64) -> Result<Option<Meetup>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {MEETUP_COLUMNS} FROM meetups WHERE id = ?1"),
                params![id],
                meetup_from_row,
            )
            .optional()
        })
    }

    async fn update_meetup(&self, meetup: &Meetup) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE meetups SET title = ?2, description = ?3, location = ?4, schedule = ?5, banner_id = ?6, updated_at = ?7
                 WHERE id = ?1",
                params![
                    meetup.id,
                    meetup.title,
                    meetup.description,
                    meetup.location,
                    millis(meetup.schedule),
                    meetup.banner_id,
                    millis(meetup.updated_at)
                ],
            )
        })?;
        Ok(())
    }

    async fn delete_meetup(&self, id: i64) -> Result<()> {
        self.with_conn(|conn| conn.execute("DELETE FROM meetups WHERE id = ?1", params![id]))?;
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
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MEETUP_COLUMNS} FROM meetups
                 WHERE schedule >= ?1 AND schedule < ?2
                 ORDER BY schedule ASC, id ASC
                 LIMIT ?3 OFFSET ?4"
            ))?;
            let rows = stmt.query_map(
                params![millis(from), millis(to), limit as i64, offset as i64],
                meetup_from_row,
            )?;
            rows.collect()
        })
    }

    async fn meetups_by_owner(&self, user_id: i64) -> Result<Vec<Meetup>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MEETUP_COLUMNS} FROM meetups WHERE user_id = ?1 ORDER BY schedule ASC, id ASC"
            ))?;
            let rows = stmt.query_map(params![user_id], meetup_from_row)?;
            rows.collect()
        })
    }

    async fn find_subscription(&self, id: i64) -> Result<Option<Subscription>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, user_id, meetup_id, created_at FROM subscriptions WHERE id = ?1",
                params![id],
                subscription_from_row,
            )
            .optional()
        })
    }

    async fn create_subscription(
        &self,
        user_id: i64,
        meetup: &Meetup,
    ) -> Result<SubscriptionOutcome> {
        let now = Utc::now();
        self.with_conn(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let duplicate: bool = tx.query_row(
                "SELECT EXISTS (SELECT 1 FROM subscriptions WHERE user_id = ?1 AND meetup_id = ?2)",
                params![user_id, meetup.id],
                |row| row.get(0),
            )?;
            if duplicate {
                return Ok(SubscriptionOutcome::AlreadySubscribed);
            }

            let conflict: bool = tx.query_row(
                "SELECT EXISTS (
                     SELECT 1 FROM subscriptions s
                     JOIN meetups m ON m.id = s.meetup_id
                     WHERE s.user_id = ?1 AND m.schedule = ?2
                 )",
                params![user_id, millis(meetup.schedule)],
                |row| row.get(0),
            )?;
            if conflict {
                return Ok(SubscriptionOutcome::ScheduleConflict);
            }

            tx.execute(
                "INSERT INTO subscriptions (user_id, meetup_id, created_at) VALUES (?1, ?2, ?3)",
                params![user_id, meetup.id, millis(now)],
            )?;
            let id = tx.last_insert_rowid();
            tx.commit()?;

            debug!("User {} subscribed to meetup {}", user_id, meetup.id);
            Ok(SubscriptionOutcome::Created(Subscription {
                id,
                user_id,
                meetup_id: meetup.id,
                created_at: now,
            }))
        })
    }

    async fn upcoming_subscriptions(
        &self,
        user_id: i64,
        after: DateTime<Utc>,
    ) -> Result<Vec<(Subscription, Meetup)>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT s.id, s.user_id, s.meetup_id, s.created_at,
                        m.id, m.title, m.description, m.location, m.schedule, m.user_id, m.banner_id, m.created_at, m.updated_at
                 FROM subscriptions s
                 JOIN meetups m ON m.id = s.meetup_id
                 WHERE s.user_id = ?1 AND m.schedule > ?2
                 ORDER BY m.schedule ASC, m.id ASC",
            )?;
            let rows = stmt.query_map(params![user_id, millis(after)], |row| {
                Ok((subscription_from_row(row)?, meetup_at(row, 4)?))
            })?;
            rows.collect()
        })
    }

    async fn delete_subscription(&self, id: i64) -> Result<()> {
        self.with_conn(|conn| conn.execute("DELETE FROM subscriptions WHERE id = ?1", params![id]))?;
        debug!("Deleted subscription {}", id);
        Ok(())
    }
}
