mod accounts;
mod applications;
mod automation;
mod config;
mod db;
mod errors;
mod jobs;
mod messaging;
mod models;
mod notifications;
mod otp;
mod pagination;
mod resumes;
mod routes;
mod state;

use anyhow::Result;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::automation::lock::RedisRunLock;
use crate::automation::providers::{build_feeds, http_client};
use crate::automation::scheduler::start_maintenance_scheduler;
use crate::automation::store::PgJobStore;
use crate::automation::system::JobAutomationSystem;
use crate::config::Config;
use crate::db::create_pool;
use crate::messaging::postmark::PostmarkClient;
use crate::messaging::whatsapp::WhatsAppClient;
use crate::notifications::{Notifier, PgNotifier};
use crate::otp::service::OtpService;
use crate::otp::store::PgOtpStore;
use crate::resumes::storage::{ResumeStorage, S3ResumeStorage};
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting job board API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;

    // Initialize Redis
    let redis = redis::Client::open(config.redis_url.clone())?;
    info!("Redis client initialized");

    // Initialize S3 / MinIO
    let s3 = build_s3_client(&config).await;
    let resume_storage: Arc<dyn ResumeStorage> =
        Arc::new(S3ResumeStorage::new(s3, config.s3_bucket.clone()));
    info!("S3 client initialized (bucket: {})", config.s3_bucket);

    // Outbound messaging
    let http = http_client()?;
    let mailer = PostmarkClient::new(http.clone(), config.postmark.clone());
    let whatsapp = WhatsAppClient::new(http.clone(), config.whatsapp.clone());
    info!(
        "Messaging initialized (email simulated: {}, whatsapp simulated: {})",
        mailer.is_simulated(),
        whatsapp.is_simulated()
    );

    let notifier: Arc<dyn Notifier> = Arc::new(PgNotifier::new(db.clone(), mailer.clone()));

    let otp = Arc::new(OtpService::new(
        Arc::new(PgOtpStore::new(db.clone())),
        Arc::new(whatsapp.clone()),
        Arc::new(mailer.clone()),
        notifier.clone(),
        config.otp_secret.clone(),
    ));

    // Job automation
    let feeds = build_feeds(&config.automation, &config.providers, http);
    let lock = RedisRunLock::new(
        redis.clone(),
        Duration::from_secs(config.automation.lock_ttl_secs),
    );
    let automation = Arc::new(JobAutomationSystem::new(
        config.automation.clone(),
        feeds,
        Arc::new(PgJobStore::new(db.clone())),
        notifier.clone(),
        Arc::new(lock),
    ));

    if config.automation.autostart {
        automation.start().await?;
    }

    // Held for the life of the process; dropping it stops the hourly cleanup.
    let _maintenance = start_maintenance_scheduler(db.clone(), otp.clone()).await?;

    let state = AppState {
        db,
        redis,
        resume_storage,
        config: config.clone(),
        automation,
        otp,
        notifier,
        whatsapp,
        mailer,
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the frontend domain is fixed

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "jobboard-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    aws_sdk_s3::Client::new(&s3_config)
}
