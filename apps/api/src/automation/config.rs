use anyhow::Result;
use serde::Serialize;

use crate::config::env_or;

/// Feature switches and limits for the sync pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct AutomationConfig {
    /// Start the periodic scheduler at boot.
    pub autostart: bool,

    pub enable_adzuna: bool,
    pub enable_jsearch: bool,
    pub enable_google_jobs: bool,
    pub enable_jooble: bool,

    pub enable_employer_posting: bool,
    pub enable_auto_approval: bool,
    pub enable_employer_notifications: bool,

    pub enable_auto_categorization: bool,
    pub enable_duplicate_detection: bool,
    pub enable_quality_scoring: bool,
    pub enable_auto_expiry: bool,

    pub sync_interval_minutes: u64,
    pub max_jobs_per_sync: usize,
    pub min_quality_score: f64,
    /// ISO country code passed to the feeds.
    pub country: String,
    /// Lifetime of the distributed run lock. Must exceed the longest sync.
    pub lock_ttl_secs: u64,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            autostart: false,
            enable_adzuna: true,
            enable_jsearch: true,
            enable_google_jobs: true,
            enable_jooble: true,
            enable_employer_posting: true,
            enable_auto_approval: true,
            enable_employer_notifications: true,
            enable_auto_categorization: true,
            enable_duplicate_detection: true,
            enable_quality_scoring: true,
            enable_auto_expiry: true,
            sync_interval_minutes: 30,
            max_jobs_per_sync: 1000,
            min_quality_score: 0.6,
            country: "IN".to_string(),
            lock_ttl_secs: 15 * 60,
        }
    }
}

impl AutomationConfig {
    pub fn from_env() -> Result<Self> {
        let d = Self::default();
        Ok(Self {
            autostart: env_or("AUTOMATION_AUTOSTART", d.autostart)?,
            enable_adzuna: env_or("ENABLE_ADZUNA", d.enable_adzuna)?,
            enable_jsearch: env_or("ENABLE_JSEARCH", d.enable_jsearch)?,
            enable_google_jobs: env_or("ENABLE_GOOGLE_JOBS", d.enable_google_jobs)?,
            enable_jooble: env_or("ENABLE_JOOBLE", d.enable_jooble)?,
            enable_employer_posting: env_or("ENABLE_EMPLOYER_POSTING", d.enable_employer_posting)?,
            enable_auto_approval: env_or("ENABLE_AUTO_APPROVAL", d.enable_auto_approval)?,
            enable_employer_notifications: env_or(
                "ENABLE_EMPLOYER_NOTIFICATIONS",
                d.enable_employer_notifications,
            )?,
            enable_auto_categorization: env_or(
                "ENABLE_AUTO_CATEGORIZATION",
                d.enable_auto_categorization,
            )?,
            enable_duplicate_detection: env_or(
                "ENABLE_DUPLICATE_DETECTION",
                d.enable_duplicate_detection,
            )?,
            enable_quality_scoring: env_or("ENABLE_QUALITY_SCORING", d.enable_quality_scoring)?,
            enable_auto_expiry: env_or("ENABLE_AUTO_EXPIRY", d.enable_auto_expiry)?,
            sync_interval_minutes: env_or("SYNC_INTERVAL_MINUTES", d.sync_interval_minutes)?,
            max_jobs_per_sync: env_or("MAX_JOBS_PER_SYNC", d.max_jobs_per_sync)?,
            min_quality_score: env_or("MIN_QUALITY_SCORE", d.min_quality_score)?,
            country: env_or("SYNC_COUNTRY", d.country)?,
            lock_ttl_secs: env_or("SYNC_LOCK_TTL_SECS", d.lock_ttl_secs)?,
        })
    }

    pub fn any_provider_enabled(&self) -> bool {
        self.enable_adzuna || self.enable_jsearch || self.enable_google_jobs || self.enable_jooble
    }
}
