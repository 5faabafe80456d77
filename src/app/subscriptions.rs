use crate::app::subscribed_meetup_view;
use crate::domain::{Subscription, SubscriptionOutcome, SubscriptionView};
use crate::error::{AppError, Result, VALIDATION_FAILS};
use crate::mail::{self, Mailer};
use crate::metrics;
use crate::storage::Storage;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubscribeRequest {
    pub user_id: Option<i64>,
    pub meetup_id: Option<i64>,
}

/// Why a subscription request was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionRejection {
    Validation,
    MeetupNotFound,
    OwnMeetup,
    PastMeetup,
    AlreadySubscribed,
    ScheduleConflict,
}

impl SubscriptionRejection {
    pub fn message(self) -> &'static str {
        match self {
            SubscriptionRejection::Validation => VALIDATION_FAILS,
            SubscriptionRejection::MeetupNotFound => "Meetup not found!",
            SubscriptionRejection::OwnMeetup => "Can't subscribe to your own meetups",
            SubscriptionRejection::PastMeetup => "Can't subscribe to past meetups",
            SubscriptionRejection::AlreadySubscribed => "You already signed up for this meetup!",
            SubscriptionRejection::ScheduleConflict => {
                "You already signed up for one meetup in this hour"
            }
        }
    }

    /// Metric label
    pub fn label(self) -> &'static str {
        match self {
            SubscriptionRejection::Validation => "validation",
            SubscriptionRejection::MeetupNotFound => "meetup_not_found",
            SubscriptionRejection::OwnMeetup => "own_meetup",
            SubscriptionRejection::PastMeetup => "past_meetup",
            SubscriptionRejection::AlreadySubscribed => "already_subscribed",
            SubscriptionRejection::ScheduleConflict => "schedule_conflict",
        }
    }
}

impl From<SubscriptionRejection> for AppError {
    fn from(rejection: SubscriptionRejection) -> Self {
        AppError::bad_request(rejection.message())
    }
}

pub const SUBSCRIPTION_NOT_FOUND: &str = "Subscription not found!";
pub const NOT_YOUR_SUBSCRIPTION: &str = "You can only unsubscribe to your own subscriptions!";

/// Upper bound on the owner notification before the response is sent
pub const DEFAULT_MAIL_TIMEOUT: Duration = Duration::from_secs(10);

pub struct SubscriptionUseCase {
    storage: Arc<dyn Storage>,
    mailer: Arc<dyn Mailer>,
    public_url: String,
    mail_timeout: Duration,
}

impl SubscriptionUseCase {
    pub fn new(storage: Arc<dyn Storage>, mailer: Arc<dyn Mailer>, public_url: impl Into<String>) -> Self {
        Self {
            storage,
            mailer,
            public_url: public_url.into(),
            mail_timeout: DEFAULT_MAIL_TIMEOUT,
        }
    }

    pub fn with_mail_timeout(mut self, timeout: Duration) -> Self {
        self.mail_timeout = timeout;
        self
    }

    /// Subscribe `user_id` to the requested meetup and notify its owner
    #[instrument(skip(self, request), fields(meetup_id = ?request.meetup_id))]
    pub async fn subscribe(
        &self,
        user_id: i64,
        request: SubscribeRequest,
        now: DateTime<Utc>,
    ) -> Result<Subscription> {
        match self.try_subscribe(user_id, request, now).await? {
            Ok(subscription) => {
                metrics::subscription_created();
                info!("User {} subscribed to meetup {}", user_id, subscription.meetup_id);
                self.notify_owner(&subscription).await;
                Ok(subscription)
            }
            Err(rejection) => {
                metrics::subscription_rejected(rejection.label());
                info!("Subscription refused: {}", rejection.label());
                Err(rejection.into())
            }
        }
    }

    async fn try_subscribe(
        &self,
        user_id: i64,
        request: SubscribeRequest,
        now: DateTime<Utc>,
    ) -> Result<std::result::Result<Subscription, SubscriptionRejection>> {
        let meetup_id = match request.meetup_id {
            Some(id) if id > 0 => id,
            _ => return Ok(Err(SubscriptionRejection::Validation)),
        };
        if request.user_id.is_some_and(|id| id != user_id) {
            return Ok(Err(SubscriptionRejection::Validation));
        }

        let Some(meetup) = self.storage.find_meetup(meetup_id).await? else {
            return Ok(Err(SubscriptionRejection::MeetupNotFound));
        };
        if meetup.user_id == user_id {
            return Ok(Err(SubscriptionRejection::OwnMeetup));
        }
        if meetup.is_past(now) {
            return Ok(Err(SubscriptionRejection::PastMeetup));
        }

        Ok(match self.storage.create_subscription(user_id, &meetup).await? {
            SubscriptionOutcome::Created(subscription) => Ok(subscription),
            SubscriptionOutcome::AlreadySubscribed => Err(SubscriptionRejection::AlreadySubscribed),
            SubscriptionOutcome::ScheduleConflict => Err(SubscriptionRejection::ScheduleConflict),
        })
    }

    /// Mail failures are logged and never reach the caller
    async fn notify_owner(&self, subscription: &Subscription) {
        match tokio::time::timeout(self.mail_timeout, self.send_notification(subscription)).await {
            Ok(Ok(())) => metrics::mail_sent(true),
            Ok(Err(e)) => {
                warn!("Failed to notify owner of meetup {}: {}", subscription.meetup_id, e);
                metrics::mail_sent(false);
            }
            Err(_) => {
                warn!(
                    "Gave up notifying owner of meetup {} after {:?}",
                    subscription.meetup_id, self.mail_timeout
                );
                metrics::mail_sent(false);
            }
        }
    }

    async fn send_notification(&self, subscription: &Subscription) -> Result<()> {
        let meetup = self
            .storage
            .find_meetup(subscription.meetup_id)
            .await?
            .ok_or_else(|| AppError::Internal(format!("meetup {} vanished", subscription.meetup_id)))?;
        let owner = self
            .storage
            .find_user(meetup.user_id)
            .await?
            .ok_or_else(|| AppError::Internal(format!("owner {} not found", meetup.user_id)))?;
        let subscriber = self
            .storage
            .find_user(subscription.user_id)
            .await?
            .ok_or_else(|| AppError::Internal(format!("user {} not found", subscription.user_id)))?;

        let message = mail::subscription_mail(&owner, &subscriber, &meetup)?;
        self.mailer.send(&message).await
    }

    /// The caller's subscriptions to meetups that have not happened yet
    pub async fn upcoming(&self, user_id: i64, now: DateTime<Utc>) -> Result<Vec<SubscriptionView>> {
        let rows = self.storage.upcoming_subscriptions(user_id, now).await?;
        let mut views = Vec::with_capacity(rows.len());
        for (subscription, meetup) in rows {
            views.push(SubscriptionView {
                id: subscription.id,
                meetup: subscribed_meetup_view(self.storage.as_ref(), meetup, now, &self.public_url).await?,
            });
        }
        Ok(views)
    }

    pub async fn unsubscribe(&self, user_id: i64, subscription_id: i64) -> Result<()> {
        let subscription = self
            .storage
            .find_subscription(subscription_id)
            .await?
            .ok_or_else(|| AppError::bad_request(SUBSCRIPTION_NOT_FOUND))?;

        if subscription.user_id != user_id {
            return Err(AppError::bad_request(NOT_YOUR_SUBSCRIPTION));
        }

        self.storage.delete_subscription(subscription.id).await?;
        info!("User {} unsubscribed from meetup {}", user_id, subscription.meetup_id);
        Ok(())
    }
}
