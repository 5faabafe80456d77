use crate::app::required;
use crate::auth;
use crate::domain::{NewUser, UserSummary};
use crate::error::{AppError, Result};
use crate::storage::Storage;
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

pub const USER_EXISTS: &str = "User already exists.";
pub const PASSWORD_MISMATCH: &str = "Password does not match";
pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterUser {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUser {
    pub name: Option<String>,
    pub email: Option<String>,
    pub old_password: Option<String>,
    pub password: Option<String>,
    pub confirm_password: Option<String>,
}

fn valid_email(email: Option<String>) -> Result<String> {
    let email = required(email)?.to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(AppError::validation()),
    }
}

fn valid_password(password: Option<String>) -> Result<String> {
    match password {
        Some(password) if password.len() >= MIN_PASSWORD_LEN => Ok(password),
        _ => Err(AppError::validation()),
    }
}

pub struct UserUseCase {
    storage: Arc<dyn Storage>,
}

impl UserUseCase {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub async fn register(&self, input: RegisterUser) -> Result<UserSummary> {
        let name = required(input.name)?;
        let email = valid_email(input.email)?;
        let password = valid_password(input.password)?;

        if self.storage.find_user_by_email(&email).await?.is_some() {
            return Err(AppError::bad_request(USER_EXISTS));
        }

        let user = self
            .storage
            .create_user(NewUser {
                name,
                email,
                password_hash: auth::hash_password(&password)?,
            })
            .await?;

        info!("Registered user {} ({})", user.id, user.email);
        Ok(UserSummary::from(&user))
    }

    pub async fn update(&self, user_id: i64, input: UpdateUser) -> Result<UserSummary> {
        let mut user = self
            .storage
            .find_user(user_id)
            .await?
            .ok_or_else(|| AppError::unauthorized(auth::TOKEN_INVALID))?;

        if let Some(name) = input.name {
            user.name = required(Some(name))?;
        }

        if input.email.is_some() {
            let email = valid_email(input.email)?;
            if email != user.email {
                if self.storage.find_user_by_email(&email).await?.is_some() {
                    return Err(AppError::bad_request(USER_EXISTS));
                }
                user.email = email;
            }
        }

        if input.password.is_some() {
            let old_password = input.old_password.ok_or_else(AppError::validation)?;
            let password = valid_password(input.password)?;
            if input.confirm_password.as_deref() != Some(password.as_str()) {
                return Err(AppError::validation());
            }
            if !auth::verify_password(&user.password_hash, &old_password) {
                return Err(AppError::unauthorized(PASSWORD_MISMATCH));
            }
            user.password_hash = auth::hash_password(&password)?;
        }

        user.updated_at = Utc::now();
        self.storage.update_user(&user).await?;
        info!("Updated user {}", user.id);
        Ok(UserSummary::from(&user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStorage;

    fn setup() -> (Arc<InMemoryStorage>, UserUseCase) {
        let storage = Arc::new(InMemoryStorage::new());
        (storage.clone(), UserUseCase::new(storage))
    }

    fn register(name: &str, email: &str, password: &str) -> RegisterUser {
        RegisterUser {
            name: Some(name.to_string()),
            email: Some(email.to_string()),
            password: Some(password.to_string()),
        }
    }

    #[tokio::test]
    async fn test_register_and_reject_duplicate_email() {
        let (_, use_case) = setup();
        let user = use_case
            .register(register("Diego", "Diego@Example.com", "123456"))
            .await
            .unwrap();
        assert_eq!(user.email, "diego@example.com");

        match use_case.register(register("Other", "diego@example.com", "abcdef")).await {
            Err(AppError::BadRequest(message)) => assert_eq!(message, USER_EXISTS),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_register_validation() {
        let (_, use_case) = setup();
        for input in [
            register("", "a@example.com", "123456"),
            register("Ana", "not-an-email", "123456"),
            register("Ana", "a@example.com", "123"),
            RegisterUser::default(),
        ] {
            assert!(matches!(
                use_case.register(input).await,
                Err(AppError::BadRequest(message)) if message == "Validation fails"
            ));
        }
    }

    #[tokio::test]
    async fn test_update_password_requires_old_password() {
        let (storage, use_case) = setup();
        let user = use_case
            .register(register("Diego", "diego@example.com", "123456"))
            .await
            .unwrap();

        let wrong_old = UpdateUser {
            old_password: Some("nope-nope".to_string()),
            password: Some("abcdef".to_string()),
            confirm_password: Some("abcdef".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            use_case.update(user.id, wrong_old).await,
            Err(AppError::Unauthorized(message)) if message == PASSWORD_MISMATCH
        ));

        let unconfirmed = UpdateUser {
            old_password: Some("123456".to_string()),
            password: Some("abcdef".to_string()),
            confirm_password: Some("abcdeg".to_string()),
            ..Default::default()
        };
        assert!(use_case.update(user.id, unconfirmed).await.is_err());

        let ok = UpdateUser {
            name: Some("Diego F".to_string()),
            old_password: Some("123456".to_string()),
            password: Some("abcdef".to_string()),
            confirm_password: Some("abcdef".to_string()),
            ..Default::default()
        };
        let updated = use_case.update(user.id, ok).await.unwrap();
        assert_eq!(updated.name, "Diego F");

        let stored = storage.find_user(user.id).await.unwrap().unwrap();
        assert!(auth::verify_password(&stored.password_hash, "abcdef"));
    }

    #[tokio::test]
    async fn test_update_email_to_taken_address_is_rejected() {
        let (_, use_case) = setup();
        let diego = use_case
            .register(register("Diego", "diego@example.com", "123456"))
            .await
            .unwrap();
        use_case
            .register(register("Ana", "ana@example.com", "123456"))
            .await
            .unwrap();

        let taken = UpdateUser {
            email: Some("ana@example.com".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            use_case.update(diego.id, taken).await,
            Err(AppError::BadRequest(message)) if message == USER_EXISTS
        ));
    }
}
