//! Use cases: the business rules behind each API resource.

use crate::domain::{BannerView, Meetup, MeetupView, OwnerView, SubscribedMeetupView};
use crate::error::{AppError, Result};
use crate::storage::Storage;
use chrono::{DateTime, Utc};

pub mod files;
pub mod meetups;
pub mod sessions;
pub mod subscriptions;
pub mod users;

pub use files::FileUseCase;
pub use meetups::MeetupUseCase;
pub use sessions::SessionUseCase;
pub use subscriptions::SubscriptionUseCase;
pub use users::UserUseCase;

/// A required, non-blank text field
pub(crate) fn required(value: Option<String>) -> Result<String> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
        _ => Err(AppError::validation()),
    }
}

/// Banner and owner projections for a meetup
async fn meetup_relations(
    storage: &dyn Storage,
    meetup: &Meetup,
    public_url: &str,
) -> Result<(Option<BannerView>, Option<OwnerView>)> {
    let banner = match meetup.banner_id {
        Some(id) => storage
            .find_file(id)
            .await?
            .map(|file| BannerView::new(&file, public_url)),
        None => None,
    };
    let owner = storage
        .find_user(meetup.user_id)
        .await?
        .map(|user| OwnerView::from(&user));
    Ok((banner, owner))
}

pub(crate) async fn meetup_view(
    storage: &dyn Storage,
    meetup: Meetup,
    now: DateTime<Utc>,
    public_url: &str,
) -> Result<MeetupView> {
    let (meetup_banner, owner) = meetup_relations(storage, &meetup, public_url).await?;
    Ok(MeetupView {
        past: meetup.is_past(now),
        id: meetup.id,
        title: meetup.title,
        description: meetup.description,
        location: meetup.location,
        schedule: meetup.schedule,
        user_id: meetup.user_id,
        banner_id: meetup.banner_id,
        meetup_banner,
        owner,
    })
}

pub(crate) async fn subscribed_meetup_view(
    storage: &dyn Storage,
    meetup: Meetup,
    now: DateTime<Utc>,
    public_url: &str,
) -> Result<SubscribedMeetupView> {
    let (meetup_banner, owner) = meetup_relations(storage, &meetup, public_url).await?;
    Ok(SubscribedMeetupView {
        past: meetup.is_past(now),
        id: meetup.id,
        title: meetup.title,
        description: meetup.description,
        location: meetup.location,
        schedule: meetup.schedule,
        meetup_banner,
        owner,
    })
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::domain::{Meetup, NewMeetup, NewUser, User};
    use crate::storage::{InMemoryStorage, Storage};
    use chrono::{DateTime, Utc};

    pub const PUBLIC_URL: &str = "http://localhost:3333";

    pub async fn user(storage: &InMemoryStorage, name: &str) -> User {
        storage
            .create_user(NewUser {
                name: name.to_string(),
                email: format!("{}@example.com", name.to_lowercase()),
                password_hash: crate::auth::hash_password("123456").unwrap(),
            })
            .await
            .unwrap()
    }

    pub async fn meetup(
        storage: &InMemoryStorage,
        owner: &User,
        title: &str,
        schedule: DateTime<Utc>,
    ) -> Meetup {
        storage
            .create_meetup(NewMeetup {
                title: title.to_string(),
                description: "An evening of talks".to_string(),
                location: "Rua Guilherme Gembala, 260".to_string(),
                schedule,
                user_id: owner.id,
                banner_id: None,
            })
            .await
            .unwrap()
    }
}
