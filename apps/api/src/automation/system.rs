//! The sync pipeline.
//!
//! One run:
//!   1. expire stale postings
//!   2. poll every configured feed, up to `max_jobs_per_sync` postings total
//!   3. per posting: update a duplicate, or score, categorize and insert
//!   4. approve recent employer postings
//!   5. rescore a batch of active postings
//!   6. tell the admins how it went
//!
//! Runs are serialized through a [`RunLock`]; a run that finds the lock taken
//! is skipped, not queued.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::json;
use tokio::sync::{Mutex, RwLock};
use tokio_cron_scheduler::JobScheduler;
use tracing::{debug, error, info, warn};

use crate::automation::categorize::categorize;
use crate::automation::config::AutomationConfig;
use crate::automation::dedup::duplicate_reason;
use crate::automation::lock::RunLock;
use crate::automation::providers::{FeedBatch, JobFeed};
use crate::automation::quality::{
    compute_quality_score, passes_threshold, QualitySignals, FEATURED_THRESHOLD,
};
use crate::automation::scheduler;
use crate::automation::store::{JobStore, JobTotals, SourceCount};
use crate::models::job::{JobRow, NormalizedJob};
use crate::models::notification::NotificationKind;
use crate::notifications::{NewNotification, Notifier};

/// Active postings older than this are expired.
pub const MAX_JOB_AGE_DAYS: i64 = 30;
/// Employer postings are picked up for approval within this window.
pub const EMPLOYER_WINDOW_HOURS: i64 = 24;
/// Postings rescored per run.
pub const RESCORE_BATCH: i64 = 100;

#[derive(Debug, Clone, Default, Serialize)]
pub struct ProviderReport {
    pub source: String,
    pub fetched: usize,
    pub inserted: usize,
    pub updated: usize,
    pub rejected: usize,
    pub failed: usize,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_ms: u64,
    pub expired: u64,
    pub fetched: usize,
    pub inserted: usize,
    pub updated: usize,
    pub rejected: usize,
    pub failed: usize,
    pub employer_approved: usize,
    pub rescored: usize,
    pub providers: Vec<ProviderReport>,
    pub errors: Vec<String>,
}

impl SyncReport {
    fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            finished_at: None,
            duration_ms: 0,
            expired: 0,
            fetched: 0,
            inserted: 0,
            updated: 0,
            rejected: 0,
            failed: 0,
            employer_approved: 0,
            rescored: 0,
            providers: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn absorb(&mut self, provider: ProviderReport) {
        self.fetched += provider.fetched;
        self.inserted += provider.inserted;
        self.updated += provider.updated;
        self.rejected += provider.rejected;
        self.failed += provider.failed;
        if let Some(e) = &provider.error {
            self.errors.push(format!("{}: {e}", provider.source));
        }
        self.providers.push(provider);
    }

    pub fn summary(&self) -> String {
        format!(
            "Sync finished in {:.1}s: {} fetched, {} new, {} updated, {} rejected, {} failed, {} expired, {} employer jobs approved, {} errors",
            self.duration_ms as f64 / 1000.0,
            self.fetched,
            self.inserted,
            self.updated,
            self.rejected,
            self.failed,
            self.expired,
            self.employer_approved,
            self.errors.len()
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Inserted,
    Updated,
    Rejected,
}

#[derive(Debug, Serialize)]
pub struct AutomationStatus {
    pub scheduler_running: bool,
    pub sync_in_progress: bool,
    pub feeds: Vec<&'static str>,
    pub config: AutomationConfig,
    pub last_run: Option<SyncReport>,
    pub totals: JobTotals,
    pub active_by_source: Vec<SourceCount>,
}

pub struct JobAutomationSystem {
    config: AutomationConfig,
    feeds: Vec<Arc<dyn JobFeed>>,
    store: Arc<dyn JobStore>,
    notifier: Arc<dyn Notifier>,
    lock: Arc<dyn RunLock>,
    last_run: RwLock<Option<SyncReport>>,
    scheduler: Mutex<Option<JobScheduler>>,
}

impl JobAutomationSystem {
    pub fn new(
        config: AutomationConfig,
        feeds: Vec<Arc<dyn JobFeed>>,
        store: Arc<dyn JobStore>,
        notifier: Arc<dyn Notifier>,
        lock: Arc<dyn RunLock>,
    ) -> Self {
        Self {
            config,
            feeds,
            store,
            notifier,
            lock,
            last_run: RwLock::new(None),
            scheduler: Mutex::new(None),
        }
    }

    /// Runs one full sync. `Ok(None)` means another run holds the lock.
    pub async fn perform_full_sync(&self) -> Result<Option<SyncReport>> {
        let Some(token) = self.lock.try_acquire().await? else {
            info!("Job sync already in progress elsewhere; skipping this run");
            return Ok(None);
        };

        let started = Instant::now();
        let mut report = SyncReport::new(Utc::now());
        info!("Starting job sync across {} feed(s)", self.feeds.len());

        self.run_pipeline(&mut report).await;

        report.duration_ms = started.elapsed().as_millis() as u64;
        report.finished_at = Some(Utc::now());

        if let Err(e) = self.lock.release(token).await {
            warn!("Failed to release sync lock: {e}");
        }

        info!("{}", report.summary());
        self.notify_admins(&report).await;
        *self.last_run.write().await = Some(report.clone());

        Ok(Some(report))
    }

    /// Runs a sync on its own task. Dropping the returned future (a client
    /// hanging up) does not cancel the run, so the lock is always released.
    pub async fn run_detached(self: &Arc<Self>) -> Result<Option<SyncReport>> {
        let system = Arc::clone(self);
        tokio::spawn(async move { system.perform_full_sync().await }).await?
    }

    async fn run_pipeline(&self, report: &mut SyncReport) {
        let now = Utc::now();

        if self.config.enable_auto_expiry {
            match self
                .store
                .expire_stale(now, Duration::days(MAX_JOB_AGE_DAYS))
                .await
            {
                Ok(expired) => report.expired = expired,
                Err(e) => {
                    error!("Job expiry failed: {e}");
                    report.errors.push(format!("expiry: {e}"));
                }
            }
        }

        let mut budget = self.config.max_jobs_per_sync;
        for feed in &self.feeds {
            if budget == 0 {
                info!("max_jobs_per_sync reached; skipping remaining feeds");
                break;
            }
            let provider = self.sync_feed(feed.as_ref(), &mut budget).await;
            report.absorb(provider);
        }

        if self.config.enable_employer_posting {
            match self.process_employer_jobs(now).await {
                Ok(approved) => report.employer_approved = approved,
                Err(e) => {
                    error!("Employer job processing failed: {e}");
                    report.errors.push(format!("employer jobs: {e}"));
                }
            }
        }

        if self.config.enable_quality_scoring {
            match self.quality_control().await {
                Ok(rescored) => report.rescored = rescored,
                Err(e) => {
                    error!("Quality control pass failed: {e}");
                    report.errors.push(format!("quality control: {e}"));
                }
            }
        }
    }

    async fn sync_feed(&self, feed: &dyn JobFeed, budget: &mut usize) -> ProviderReport {
        let source = feed.source();
        let mut provider = ProviderReport {
            source: source.to_string(),
            ..Default::default()
        };

        let FeedBatch { jobs, malformed } = match feed.fetch(&self.config.country).await {
            Ok(batch) => batch,
            Err(e) => {
                error!("Feed {source} failed: {e}");
                provider.error = Some(e.to_string());
                return provider;
            }
        };
        provider.failed = malformed;

        let take = jobs.len().min(*budget);
        *budget -= take;
        provider.fetched = take;

        for job in jobs.into_iter().take(take) {
            match self.ingest(source, &job).await {
                Ok(IngestOutcome::Inserted) => provider.inserted += 1,
                Ok(IngestOutcome::Updated) => provider.updated += 1,
                Ok(IngestOutcome::Rejected) => provider.rejected += 1,
                Err(e) => {
                    warn!("Failed to store {source} job '{}': {e}", job.title);
                    provider.failed += 1;
                }
            }
        }

        info!(
            "Feed {source}: {} fetched, {} new, {} updated, {} rejected, {} failed",
            provider.fetched, provider.inserted, provider.updated, provider.rejected, provider.failed
        );
        provider
    }

    /// Stores one feed posting: refreshes a duplicate, otherwise scores,
    /// categorizes and inserts it.
    pub async fn ingest(&self, source: &str, job: &NormalizedJob) -> Result<IngestOutcome> {
        if job.title.trim().is_empty() {
            return Ok(IngestOutcome::Rejected);
        }

        let score = self
            .config
            .enable_quality_scoring
            .then(|| compute_quality_score(QualitySignals::from(job)));
        let sector = self
            .config
            .enable_auto_categorization
            .then(|| categorize(&job.title, &job.description, &job.skills));

        if self.config.enable_duplicate_detection {
            if let Some(existing) = self.store.find_duplicate(source, job).await? {
                debug!(
                    "Refreshing job {} from {source} ({:?} match)",
                    existing.id,
                    duplicate_reason(source, job, &existing)
                );
                self.store
                    .refresh_existing(existing.id, job, score, sector)
                    .await?;
                return Ok(IngestOutcome::Updated);
            }
        }

        if let Some(score) = score {
            if !passes_threshold(score, self.config.min_quality_score) {
                return Ok(IngestOutcome::Rejected);
            }
        }

        self.store.insert_external(source, job, score, sector).await?;
        Ok(IngestOutcome::Inserted)
    }

    /// Approves recent employer postings and tells their authors.
    async fn process_employer_jobs(&self, now: DateTime<Utc>) -> Result<usize> {
        let pending = self
            .store
            .pending_employer_jobs(now - Duration::hours(EMPLOYER_WINDOW_HOURS))
            .await?;

        let mut approved = 0;
        for job in pending {
            let score = compute_quality_score(QualitySignals::from(&job));
            let sector = self.sector_if_missing(&job);

            if !self.config.enable_auto_approval {
                self.store.set_quality(job.id, Some(score), sector).await?;
                continue;
            }

            let featured = score > FEATURED_THRESHOLD;
            self.store
                .approve_employer_job(job.id, Some(score), featured, now)
                .await?;
            if sector.is_some() {
                self.store.set_quality(job.id, None, sector).await?;
            }
            approved += 1;

            if self.config.enable_employer_notifications {
                if let Some(author) = job.created_by {
                    let notification = NewNotification::new(
                        author,
                        NotificationKind::JobPosted,
                        "Your job is live",
                        format!(
                            "\"{}\" was approved{}.",
                            job.title,
                            if featured { " and featured" } else { "" }
                        ),
                    )
                    .with_data(json!({ "job_id": job.id, "quality_score": score, "featured": featured }));
                    if let Err(e) = self.notifier.notify(notification).await {
                        warn!("Failed to notify employer {author} about job {}: {e}", job.id);
                    }
                }
            }
        }

        if approved > 0 {
            info!("Approved {approved} employer job(s)");
        }
        Ok(approved)
    }

    /// Rescores the batch of active postings scored longest ago. Every visited
    /// row is stamped so the next run moves on to the following batch.
    async fn quality_control(&self) -> Result<usize> {
        let jobs = self.store.active_jobs_for_rescore(RESCORE_BATCH).await?;
        let mut rescored = 0;

        for job in jobs {
            let score = compute_quality_score(QualitySignals::from(&job));
            let stale = job
                .quality_score
                .map(|s| (s - score).abs() > f64::EPSILON)
                .unwrap_or(true);
            let sector = self.sector_if_missing(&job);

            self.store
                .set_quality(job.id, stale.then_some(score), sector)
                .await?;
            if stale || sector.is_some() {
                rescored += 1;
            }
        }
        Ok(rescored)
    }

    fn sector_if_missing(&self, job: &JobRow) -> Option<&'static str> {
        (self.config.enable_auto_categorization && job.sector.is_none())
            .then(|| categorize(&job.title, &job.description, &job.skills))
    }

    async fn notify_admins(&self, report: &SyncReport) {
        let data = match serde_json::to_value(report) {
            Ok(data) => data,
            Err(e) => {
                warn!("Could not serialize sync report: {e}");
                json!({})
            }
        };
        if let Err(e) = self
            .notifier
            .notify_admins(NotificationKind::System, "Job sync completed", &report.summary(), data)
            .await
        {
            warn!("Failed to notify admins about sync: {e}");
        }
    }

    /// Starts the periodic sync. Returns `false` if it was already running.
    pub async fn start(self: &Arc<Self>) -> Result<bool> {
        let mut slot = self.scheduler.lock().await;
        if slot.is_some() {
            return Ok(false);
        }
        if !self.config.any_provider_enabled() {
            warn!("Job automation starting with every feed disabled; runs will only expire and rescore");
        }
        let scheduler =
            scheduler::start_sync_scheduler(Arc::downgrade(self), self.config.sync_interval_minutes)
                .await?;
        *slot = Some(scheduler);
        info!(
            "Job automation started (every {} minutes)",
            self.config.sync_interval_minutes
        );
        Ok(true)
    }

    /// Stops the periodic sync. A run already in flight finishes.
    pub async fn stop(&self) -> Result<bool> {
        let Some(mut scheduler) = self.scheduler.lock().await.take() else {
            return Ok(false);
        };
        scheduler.shutdown().await?;
        info!("Job automation stopped");
        Ok(true)
    }

    pub async fn is_scheduled(&self) -> bool {
        self.scheduler.lock().await.is_some()
    }

    pub async fn last_run(&self) -> Option<SyncReport> {
        self.last_run.read().await.clone()
    }

    pub async fn status(&self) -> Result<AutomationStatus> {
        Ok(AutomationStatus {
            scheduler_running: self.is_scheduled().await,
            sync_in_progress: self.lock.is_held().await?,
            feeds: self.feeds.iter().map(|f| f.source()).collect(),
            config: self.config.clone(),
            last_run: self.last_run().await,
            totals: self.store.totals().await?,
            active_by_source: self.store.active_by_source().await?,
        })
    }
}
