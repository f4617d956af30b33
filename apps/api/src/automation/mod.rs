// Job automation: external feed sync, duplicate detection, quality scoring,
// categorization and expiry. Runs on a timer and on demand from the admin API.

pub mod categorize;
pub mod config;
pub mod dedup;
pub mod handlers;
pub mod lock;
pub mod providers;
pub mod quality;
pub mod scheduler;
pub mod store;
pub mod system;
