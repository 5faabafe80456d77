//! Listing state behind the mobile "Meetups" tab: one day at a time,
//! paginated, with infinite scroll.

use super::{ClientError, ClientResult, MeetupFeed};
use crate::app::meetups::PAGE_SIZE;
use crate::domain::MeetupView;
use crate::locale;
use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
#[error("Não foi possivel carregar as meetups")]
pub struct DashboardError(#[source] pub ClientError);

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardMeetup {
    pub meetup: MeetupView,
    pub formatted_date: String,
    pub subscribed: bool,
}

pub struct Dashboard<F> {
    feed: F,
    date: DateTime<Utc>,
    /// Zero-based; the API page requested is `page + 1`
    page: u32,
    meetups: Vec<DashboardMeetup>,
    loading: bool,
    refreshing: bool,
    last_page: bool,
}

impl<F: MeetupFeed> Dashboard<F> {
    pub fn new(feed: F, date: DateTime<Utc>) -> Self {
        Self {
            feed,
            date,
            page: 0,
            meetups: Vec::new(),
            loading: false,
            refreshing: false,
            last_page: false,
        }
    }

    pub fn date(&self) -> DateTime<Utc> {
        self.date
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn meetups(&self) -> &[DashboardMeetup] {
        &self.meetups
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_refreshing(&self) -> bool {
        self.refreshing
    }

    pub fn is_last_page(&self) -> bool {
        self.last_page
    }

    /// Header label, e.g. "18 de outubro de 2026"
    pub fn title(&self) -> String {
        locale::format_day(&self.date)
    }

    /// The screen gained focus
    pub async fn focus(&mut self) -> Result<(), DashboardError> {
        self.load().await
    }

    pub async fn load(&mut self) -> Result<(), DashboardError> {
        self.loading = true;
        self.last_page = false;

        let result = self.fetch().await;
        self.loading = false;

        result.map_err(|e| {
            warn!("Failed to load meetups for {}: {}", self.date, e);
            self.refreshing = false;
            DashboardError(e)
        })
    }

    async fn fetch(&mut self) -> ClientResult<()> {
        let page = self.feed.meetups(self.date, self.page + 1).await?;

        if page.is_empty() {
            self.last_page = true;
            if self.page > 0 {
                self.refreshing = false;
            } else {
                self.meetups.clear();
            }
            return Ok(());
        }

        if page.len() < PAGE_SIZE {
            self.last_page = true;
        }

        let subscribed = self.feed.subscribed_meetup_ids().await?;
        let items = page.into_iter().map(|meetup| DashboardMeetup {
            formatted_date: locale::format_schedule(&meetup.schedule),
            subscribed: subscribed.contains(&meetup.id),
            meetup,
        });

        if self.page > 0 {
            self.meetups.extend(items);
            self.refreshing = false;
        } else {
            self.meetups = items.collect();
        }
        Ok(())
    }

    /// End of list reached; ignored while a page is in flight or after the last page.
    /// A failed fetch leaves `page` on the last page that loaded.
    pub async fn load_more(&mut self) -> Result<(), DashboardError> {
        if self.refreshing || self.last_page {
            return Ok(());
        }
        self.refreshing = true;
        self.page += 1;
        let result = self.load().await;
        if result.is_err() {
            self.page -= 1;
        }
        result
    }

    pub async fn next_day(&mut self) -> Result<(), DashboardError> {
        self.change_day(Duration::days(1)).await
    }

    pub async fn previous_day(&mut self) -> Result<(), DashboardError> {
        self.change_day(Duration::days(-1)).await
    }

    async fn change_day(&mut self, delta: Duration) -> Result<(), DashboardError> {
        self.date += delta;
        self.page = 0;
        self.refreshing = false;
        self.load().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    struct FakeFeed {
        meetups: Vec<MeetupView>,
        subscribed: Vec<i64>,
        fail: AtomicBool,
        requests: Mutex<Vec<(DateTime<Utc>, u32)>>,
    }

    impl FakeFeed {
        fn new(meetups: Vec<MeetupView>, subscribed: Vec<i64>) -> Self {
            Self {
                meetups,
                subscribed,
                fail: AtomicBool::new(false),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl MeetupFeed for FakeFeed {
        async fn meetups(&self, date: DateTime<Utc>, page: u32) -> ClientResult<Vec<MeetupView>> {
            self.requests.lock().unwrap().push((date, page));
            if self.fail.load(Ordering::SeqCst) {
                return Err(ClientError::Api {
                    status: 500,
                    message: "boom".to_string(),
                });
            }
            let day = date.date_naive();
            Ok(self
                .meetups
                .iter()
                .filter(|m| m.schedule.date_naive() == day)
                .skip((page as usize - 1) * PAGE_SIZE)
                .take(PAGE_SIZE)
                .cloned()
                .collect())
        }

        async fn subscribed_meetup_ids(&self) -> ClientResult<Vec<i64>> {
            Ok(self.subscribed.clone())
        }
    }

    fn day() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, 9, 0, 0).unwrap()
    }

    fn meetups(count: i64, start: DateTime<Utc>) -> Vec<MeetupView> {
        (0..count)
            .map(|i| MeetupView {
                id: i + 1,
                title: format!("Meetup {}", i + 1),
                description: "Talks".to_string(),
                location: "Downtown".to_string(),
                schedule: start + Duration::minutes(i * 30),
                past: false,
                user_id: 1,
                banner_id: None,
                meetup_banner: None,
                owner: None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_first_load_marks_subscriptions_and_formats_dates() {
        let feed = FakeFeed::new(meetups(3, day()), vec![2]);
        let mut dashboard = Dashboard::new(feed, day());

        dashboard.focus().await.unwrap();

        assert_eq!(dashboard.meetups().len(), 3);
        assert!(!dashboard.meetups()[0].subscribed);
        assert!(dashboard.meetups()[1].subscribed);
        assert_eq!(dashboard.meetups()[0].formatted_date, "18 de outubro, às 09:00h");
        assert!(dashboard.is_last_page());
        assert!(!dashboard.is_loading());
        assert_eq!(dashboard.title(), "18 de outubro de 2026");
    }

    #[tokio::test]
    async fn test_load_more_appends_next_page_and_stops_at_short_page() {
        let feed = FakeFeed::new(meetups(14, day()), vec![]);
        let mut dashboard = Dashboard::new(feed, day());

        dashboard.load().await.unwrap();
        assert_eq!(dashboard.meetups().len(), 10);
        assert!(!dashboard.is_last_page());

        dashboard.load_more().await.unwrap();
        assert_eq!(dashboard.page(), 1);
        assert_eq!(dashboard.meetups().len(), 14);
        assert!(dashboard.is_last_page());
        assert!(!dashboard.is_refreshing());

        // Nothing more to fetch
        dashboard.load_more().await.unwrap();
        assert_eq!(dashboard.page(), 1);
        let pages: Vec<u32> = dashboard.feed.requests.lock().unwrap().iter().map(|(_, p)| *p).collect();
        assert_eq!(pages, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_load_more_is_ignored_while_refreshing() {
        let feed = FakeFeed::new(meetups(20, day()), vec![]);
        let mut dashboard = Dashboard::new(feed, day());
        dashboard.load().await.unwrap();

        dashboard.refreshing = true;
        dashboard.load_more().await.unwrap();
        assert_eq!(dashboard.page(), 0);
        assert_eq!(dashboard.feed.requests.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_later_page_keeps_loaded_meetups() {
        let feed = FakeFeed::new(meetups(10, day()), vec![]);
        let mut dashboard = Dashboard::new(feed, day());
        dashboard.load().await.unwrap();
        assert!(!dashboard.is_last_page());

        dashboard.load_more().await.unwrap();
        assert_eq!(dashboard.meetups().len(), 10);
        assert!(dashboard.is_last_page());
        assert!(!dashboard.is_refreshing());
    }

    #[tokio::test]
    async fn test_changing_day_resets_page_and_replaces_list() {
        let mut all = meetups(12, day());
        all.extend(meetups(2, day() + Duration::days(1)).into_iter().map(|mut m| {
            m.id += 100;
            m
        }));
        let mut dashboard = Dashboard::new(FakeFeed::new(all, vec![]), day());

        dashboard.load().await.unwrap();
        dashboard.load_more().await.unwrap();
        assert_eq!(dashboard.meetups().len(), 12);

        dashboard.next_day().await.unwrap();
        assert_eq!(dashboard.page(), 0);
        assert_eq!(dashboard.meetups().len(), 2);
        assert_eq!(dashboard.meetups()[0].meetup.id, 101);

        dashboard.previous_day().await.unwrap();
        dashboard.previous_day().await.unwrap();
        assert!(dashboard.meetups().is_empty());
        assert_eq!(dashboard.date(), day() - Duration::days(1));
    }

    #[tokio::test]
    async fn test_failed_load_reports_error_and_clears_flags() {
        let feed = FakeFeed::new(meetups(3, day()), vec![]);
        feed.fail.store(true, Ordering::SeqCst);
        let mut dashboard = Dashboard::new(feed, day());

        let err = dashboard.load().await.unwrap_err();
        assert_eq!(err.to_string(), "Não foi possivel carregar as meetups");
        assert!(!dashboard.is_loading());
        assert!(!dashboard.is_refreshing());
    }

    #[tokio::test]
    async fn test_failed_load_more_retries_the_same_page() {
        let feed = FakeFeed::new(meetups(15, day()), vec![]);
        let mut dashboard = Dashboard::new(feed, day());
        dashboard.load().await.unwrap();

        dashboard.feed.fail.store(true, Ordering::SeqCst);
        assert!(dashboard.load_more().await.is_err());
        assert_eq!(dashboard.page(), 0);
        assert_eq!(dashboard.meetups().len(), 10);
        assert!(!dashboard.is_refreshing());

        dashboard.feed.fail.store(false, Ordering::SeqCst);
        dashboard.load_more().await.unwrap();
        assert_eq!(dashboard.page(), 1);
        assert_eq!(dashboard.meetups().len(), 15);

        let pages: Vec<u32> = dashboard.feed.requests.lock().unwrap().iter().map(|(_, p)| *p).collect();
        assert_eq!(pages, vec![1, 2, 2]);
    }
}
