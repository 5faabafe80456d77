use crate::app::{meetup_view, required};
use crate::domain::{Meetup, MeetupView, NewMeetup};
use crate::error::{AppError, Result};
use crate::storage::Storage;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, SubsecRound, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

/// Meetups per listing page
pub const PAGE_SIZE: usize = 10;

pub const MEETUP_NOT_FOUND: &str = "Meetup not found!";
pub const PAST_DATES: &str = "Past dates are not permitted";
pub const BANNER_NOT_FOUND: &str = "Banner not found";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateMeetup {
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub schedule: Option<DateTime<Utc>>,
    pub banner_id: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateMeetup {
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub schedule: Option<DateTime<Utc>>,
    pub banner_id: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    pub date: Option<String>,
    pub page: Option<u32>,
}

/// Start and end of the UTC day containing the given date or instant
pub fn day_bounds(date: &str) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let day = DateTime::parse_from_rfc3339(date)
        .map(|ts| ts.with_timezone(&Utc).date_naive())
        .or_else(|_| NaiveDate::parse_from_str(date, "%Y-%m-%d"))
        .ok()?;
    let start = day.and_time(NaiveTime::MIN).and_utc();
    Some((start, start + Duration::days(1)))
}

pub struct MeetupUseCase {
    storage: Arc<dyn Storage>,
    public_url: String,
}

impl MeetupUseCase {
    pub fn new(storage: Arc<dyn Storage>, public_url: impl Into<String>) -> Self {
        Self {
            storage,
            public_url: public_url.into(),
        }
    }

    async fn view(&self, meetup: Meetup, now: DateTime<Utc>) -> Result<MeetupView> {
        meetup_view(self.storage.as_ref(), meetup, now, &self.public_url).await
    }

    async fn views(&self, meetups: Vec<Meetup>, now: DateTime<Utc>) -> Result<Vec<MeetupView>> {
        let mut views = Vec::with_capacity(meetups.len());
        for meetup in meetups {
            views.push(self.view(meetup, now).await?);
        }
        Ok(views)
    }

    async fn ensure_banner(&self, banner_id: Option<i64>) -> Result<()> {
        if let Some(id) = banner_id {
            if self.storage.find_file(id).await?.is_none() {
                return Err(AppError::bad_request(BANNER_NOT_FOUND));
            }
        }
        Ok(())
    }

    /// Meetup owned by `user_id` that has not happened yet
    async fn editable(
        &self,
        user_id: i64,
        id: i64,
        now: DateTime<Utc>,
        not_owner: &str,
        past: &str,
    ) -> Result<Meetup> {
        let meetup = self
            .storage
            .find_meetup(id)
            .await?
            .ok_or_else(|| AppError::bad_request(MEETUP_NOT_FOUND))?;
        if meetup.user_id != user_id {
            return Err(AppError::bad_request(not_owner));
        }
        if meetup.is_past(now) {
            return Err(AppError::bad_request(past));
        }
        Ok(meetup)
    }

    pub async fn create(&self, user_id: i64, input: CreateMeetup, now: DateTime<Utc>) -> Result<MeetupView> {
        let title = required(input.title)?;
        let description = required(input.description)?;
        let location = required(input.location)?;
        // Millisecond precision, the resolution stored in SQLite
        let schedule = input
            .schedule
            .ok_or_else(AppError::validation)?
            .trunc_subsecs(3);

        if schedule < now {
            return Err(AppError::bad_request(PAST_DATES));
        }
        self.ensure_banner(input.banner_id).await?;

        let meetup = self
            .storage
            .create_meetup(NewMeetup {
                title,
                description,
                location,
                schedule,
                user_id,
                banner_id: input.banner_id,
            })
            .await?;

        info!("User {} created meetup {} ({})", user_id, meetup.id, meetup.title);
        self.view(meetup, now).await
    }

    pub async fn update(
        &self,
        user_id: i64,
        id: i64,
        input: UpdateMeetup,
        now: DateTime<Utc>,
    ) -> Result<MeetupView> {
        let mut meetup = self
            .editable(
                user_id,
                id,
                now,
                "You can only edit your own meetups",
                "Can't edit past meetups",
            )
            .await?;

        if let Some(title) = input.title {
            meetup.title = required(Some(title))?;
        }
        if let Some(description) = input.description {
            meetup.description = required(Some(description))?;
        }
        if let Some(location) = input.location {
            meetup.location = required(Some(location))?;
        }
        if let Some(schedule) = input.schedule.map(|ts| ts.trunc_subsecs(3)) {
            if schedule < now {
                return Err(AppError::bad_request(PAST_DATES));
            }
            meetup.schedule = schedule;
        }
        if input.banner_id.is_some() {
            self.ensure_banner(input.banner_id).await?;
            meetup.banner_id = input.banner_id;
        }
        meetup.updated_at = now;

        self.storage.update_meetup(&meetup).await?;
        info!("User {} updated meetup {}", user_id, meetup.id);
        self.view(meetup, now).await
    }

    pub async fn delete(&self, user_id: i64, id: i64, now: DateTime<Utc>) -> Result<()> {
        let meetup = self
            .editable(
                user_id,
                id,
                now,
                "You can only cancel your own meetups",
                "Can't cancel past meetups",
            )
            .await?;

        self.storage.delete_meetup(meetup.id).await?;
        info!("User {} cancelled meetup {}", user_id, meetup.id);
        Ok(())
    }

    /// One page of the meetups scheduled on the day of `query.date`
    pub async fn list(&self, query: ListQuery, now: DateTime<Utc>) -> Result<Vec<MeetupView>> {
        let (from, to) = query
            .date
            .as_deref()
            .and_then(day_bounds)
            .ok_or_else(AppError::validation)?;
        let page = query.page.unwrap_or(1).max(1) as usize;

        let meetups = self
            .storage
            .meetups_between(from, to, PAGE_SIZE, (page - 1) * PAGE_SIZE)
            .await?;
        self.views(meetups, now).await
    }

    pub async fn organizing(&self, user_id: i64, now: DateTime<Utc>) -> Result<Vec<MeetupView>> {
        let meetups = self.storage.meetups_by_owner(user_id).await?;
        self.views(meetups, now).await
    }

    pub async fn show(&self, id: i64, now: DateTime<Utc>) -> Result<MeetupView> {
        let meetup = self
            .storage
            .find_meetup(id)
            .await?
            .ok_or_else(|| AppError::bad_request(MEETUP_NOT_FOUND))?;
        self.view(meetup, now).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::testing::{self, PUBLIC_URL};
    use crate::domain::NewFile;
    use crate::storage::InMemoryStorage;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap()
    }

    fn setup() -> (Arc<InMemoryStorage>, MeetupUseCase) {
        let storage = Arc::new(InMemoryStorage::new());
        let use_case = MeetupUseCase::new(storage.clone(), PUBLIC_URL);
        (storage, use_case)
    }

    fn input(schedule: DateTime<Utc>) -> CreateMeetup {
        CreateMeetup {
            title: Some("Rust Night".to_string()),
            description: Some("Talks about async".to_string()),
            location: Some("Downtown".to_string()),
            schedule: Some(schedule),
            banner_id: None,
        }
    }

    fn message<T: std::fmt::Debug>(result: Result<T>) -> String {
        match result {
            Err(AppError::BadRequest(message)) => message,
            other => panic!("expected a rejection, got {other:?}"),
        }
    }

    #[test]
    fn test_day_bounds_accepts_instants_and_dates() {
        let (from, to) = day_bounds("2026-10-18T15:30:00.000Z").unwrap();
        assert_eq!(from, Utc.with_ymd_and_hms(2026, 10, 18, 0, 0, 0).unwrap());
        assert_eq!(to, Utc.with_ymd_and_hms(2026, 10, 19, 0, 0, 0).unwrap());

        let (from, _) = day_bounds("2026-10-18").unwrap();
        assert_eq!(from, Utc.with_ymd_and_hms(2026, 10, 18, 0, 0, 0).unwrap());

        assert!(day_bounds("yesterday").is_none());
    }

    #[tokio::test]
    async fn test_create_rejects_past_dates_and_missing_fields() {
        let (storage, use_case) = setup();
        let owner = testing::user(&storage, "Diego").await;

        let result = use_case.create(owner.id, input(now() - Duration::hours(1)), now()).await;
        assert_eq!(message(result), PAST_DATES);

        let mut missing = input(now() + Duration::days(1));
        missing.title = Some("   ".to_string());
        assert_eq!(message(use_case.create(owner.id, missing, now()).await), "Validation fails");

        let mut unknown_banner = input(now() + Duration::days(1));
        unknown_banner.banner_id = Some(42);
        assert_eq!(
            message(use_case.create(owner.id, unknown_banner, now()).await),
            BANNER_NOT_FOUND
        );
    }

    #[tokio::test]
    async fn test_create_returns_view_with_banner_and_owner() {
        let (storage, use_case) = setup();
        let owner = testing::user(&storage, "Diego").await;
        let banner = storage
            .create_file(NewFile {
                name: "banner.png".to_string(),
                path: "abc.png".to_string(),
            })
            .await
            .unwrap();

        let mut with_banner = input(now() + Duration::days(1));
        with_banner.banner_id = Some(banner.id);
        let view = use_case.create(owner.id, with_banner, now()).await.unwrap();

        assert!(!view.past);
        assert_eq!(view.user_id, owner.id);
        assert_eq!(
            view.meetup_banner.map(|b| b.url),
            Some("http://localhost:3333/uploads/abc.png".to_string())
        );
        assert_eq!(view.owner.map(|o| o.name), Some("Diego".to_string()));
    }

    #[tokio::test]
    async fn test_list_returns_one_day_ten_per_page() {
        let (storage, use_case) = setup();
        let owner = testing::user(&storage, "Diego").await;
        let day = Utc.with_ymd_and_hms(2026, 11, 2, 0, 0, 0).unwrap();
        for hour in 0..13 {
            testing::meetup(&storage, &owner, &format!("M{hour}"), day + Duration::hours(hour)).await;
        }
        testing::meetup(&storage, &owner, "Next day", day + Duration::days(1)).await;
        testing::meetup(&storage, &owner, "Day before", day - Duration::minutes(1)).await;

        let query = |page| ListQuery {
            date: Some("2026-11-02T10:00:00Z".to_string()),
            page,
        };
        let first = use_case.list(query(None), now()).await.unwrap();
        let second = use_case.list(query(Some(2)), now()).await.unwrap();
        let third = use_case.list(query(Some(3)), now()).await.unwrap();

        assert_eq!(first.len(), PAGE_SIZE);
        assert_eq!(first[0].title, "M0");
        assert_eq!(second.len(), 3);
        assert_eq!(second[2].title, "M12");
        assert!(third.is_empty());

        let missing_date = use_case.list(ListQuery::default(), now()).await;
        assert_eq!(message(missing_date), "Validation fails");
    }

    #[tokio::test]
    async fn test_update_and_delete_require_owner_and_future_meetup() {
        let (storage, use_case) = setup();
        let owner = testing::user(&storage, "Diego").await;
        let other = testing::user(&storage, "Ana").await;
        let upcoming = testing::meetup(&storage, &owner, "Upcoming", now() + Duration::days(1)).await;
        let past = testing::meetup(&storage, &owner, "Past", now() - Duration::days(1)).await;

        let rename = UpdateMeetup {
            title: Some("Renamed".to_string()),
            ..Default::default()
        };
        assert_eq!(
            message(use_case.update(other.id, upcoming.id, rename.clone(), now()).await),
            "You can only edit your own meetups"
        );
        assert_eq!(
            message(use_case.update(owner.id, past.id, rename.clone(), now()).await),
            "Can't edit past meetups"
        );
        let updated = use_case.update(owner.id, upcoming.id, rename, now()).await.unwrap();
        assert_eq!(updated.title, "Renamed");

        assert_eq!(
            message(use_case.delete(other.id, upcoming.id, now()).await),
            "You can only cancel your own meetups"
        );
        assert_eq!(
            message(use_case.delete(owner.id, past.id, now()).await),
            "Can't cancel past meetups"
        );
        use_case.delete(owner.id, upcoming.id, now()).await.unwrap();
        assert_eq!(message(use_case.show(upcoming.id, now()).await), MEETUP_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_organizing_lists_only_own_meetups() {
        let (storage, use_case) = setup();
        let owner = testing::user(&storage, "Diego").await;
        let other = testing::user(&storage, "Ana").await;
        testing::meetup(&storage, &owner, "Second", now() + Duration::days(2)).await;
        testing::meetup(&storage, &owner, "First", now() - Duration::days(2)).await;
        testing::meetup(&storage, &other, "Not mine", now() + Duration::days(1)).await;

        let mine = use_case.organizing(owner.id, now()).await.unwrap();
        let titles: Vec<&str> = mine.iter().map(|m| m.title.as_str()).collect();
        assert_eq!(titles, vec!["First", "Second"]);
        assert!(mine[0].past);
        assert!(!mine[1].past);
    }
}
