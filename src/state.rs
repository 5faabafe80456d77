use crate::app::{FileUseCase, MeetupUseCase, SessionUseCase, SubscriptionUseCase, UserUseCase};
use crate::config::Config;
use crate::mail::Mailer;
use crate::storage::Storage;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;

/// Shared handles cloned into every request
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub mailer: Arc<dyn Mailer>,
    pub config: Arc<Config>,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(storage: Arc<dyn Storage>, mailer: Arc<dyn Mailer>, config: Config) -> Self {
        Self {
            storage,
            mailer,
            config: Arc::new(config),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    pub fn users(&self) -> UserUseCase {
        UserUseCase::new(self.storage.clone())
    }

    pub fn sessions(&self) -> SessionUseCase {
        SessionUseCase::new(self.storage.clone(), self.config.auth.token_ttl_hours)
    }

    pub fn files(&self) -> FileUseCase {
        FileUseCase::new(
            self.storage.clone(),
            self.config.uploads.dir.clone(),
            self.config.server.public_url.clone(),
        )
    }

    pub fn meetups(&self) -> MeetupUseCase {
        MeetupUseCase::new(self.storage.clone(), self.config.server.public_url.clone())
    }

    pub fn subscriptions(&self) -> SubscriptionUseCase {
        SubscriptionUseCase::new(
            self.storage.clone(),
            self.mailer.clone(),
            self.config.server.public_url.clone(),
        )
        .with_mail_timeout(Duration::from_secs(self.config.mail.timeout_secs))
    }
}
