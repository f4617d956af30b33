use std::sync::Arc;

use redis::Client as RedisClient;
use sqlx::PgPool;

use crate::automation::system::JobAutomationSystem;
use crate::config::Config;
use crate::messaging::postmark::PostmarkClient;
use crate::messaging::whatsapp::WhatsAppClient;
use crate::notifications::Notifier;
use crate::otp::service::OtpService;
use crate::resumes::storage::ResumeStorage;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    /// Also backs the sync run lock.
    pub redis: RedisClient,
    /// Resume files (S3 or MinIO).
    pub resume_storage: Arc<dyn ResumeStorage>,
    pub config: Config,
    pub automation: Arc<JobAutomationSystem>,
    pub otp: Arc<OtpService>,
    /// In-app notifications, with email copies for the kinds that want them.
    pub notifier: Arc<dyn Notifier>,
    pub whatsapp: WhatsAppClient,
    pub mailer: PostmarkClient,
}
