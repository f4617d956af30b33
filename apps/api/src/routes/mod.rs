pub mod admin;
pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, patch, post},
    Router,
};

use crate::accounts::handlers as accounts;
use crate::applications::handlers as applications;
use crate::automation::handlers as automation;
use crate::jobs::handlers as jobs;
use crate::notifications::handlers as notifications;
use crate::otp::handlers as otp;
use crate::resumes::{handlers as resumes, MAX_RESUME_BYTES};
use crate::state::AppState;

/// Multipart framing on top of the file itself.
const UPLOAD_OVERHEAD_BYTES: usize = 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Jobs
        .route(
            "/api/jobs",
            get(jobs::handle_list_jobs).post(jobs::handle_create_job),
        )
        .route(
            "/api/jobs/:id",
            get(jobs::handle_get_job)
                .put(jobs::handle_update_job)
                .delete(jobs::handle_delete_job),
        )
        .route(
            "/api/jobs/:id/applications",
            get(applications::handle_list_job_applications),
        )
        // Applications
        .route(
            "/api/applications",
            get(applications::handle_list_applications).post(applications::handle_apply),
        )
        .route(
            "/api/applications/:id/status",
            patch(applications::handle_update_status),
        )
        .route(
            "/api/applications/:id/withdraw",
            post(applications::handle_withdraw),
        )
        // Resumes
        .route(
            "/api/resumes",
            get(resumes::handle_list_resumes).post(resumes::handle_upload_resume),
        )
        .route(
            "/api/resumes/:id",
            get(resumes::handle_get_resume).delete(resumes::handle_delete_resume),
        )
        // Users and companies
        .route("/api/users", post(accounts::handle_register_user))
        .route("/api/users/:id", get(accounts::handle_get_user))
        .route(
            "/api/companies",
            get(accounts::handle_list_companies).post(accounts::handle_create_company),
        )
        .route("/api/companies/:id", get(accounts::handle_get_company))
        // Notifications
        .route(
            "/api/notifications",
            get(notifications::handle_list_notifications),
        )
        .route(
            "/api/notifications/read-all",
            post(notifications::handle_mark_all_read),
        )
        .route(
            "/api/notifications/:id/read",
            patch(notifications::handle_mark_read),
        )
        // OTP
        .route("/api/otp/send", post(otp::handle_send_otp))
        .route("/api/otp/verify", post(otp::handle_verify_otp))
        // Admin
        .route("/api/admin/jobs", get(admin::handle_list_jobs))
        .route("/api/admin/jobs/bulk", post(admin::handle_bulk_jobs))
        .route("/api/admin/otp/stats", get(admin::handle_otp_stats))
        .route(
            "/api/admin/messaging/status",
            get(admin::handle_messaging_status),
        )
        .route(
            "/api/admin/automation/status",
            get(automation::handle_status),
        )
        .route("/api/admin/automation/run", post(automation::handle_run_now))
        .route("/api/admin/automation/start", post(automation::handle_start))
        .route("/api/admin/automation/stop", post(automation::handle_stop))
        .layer(DefaultBodyLimit::max(MAX_RESUME_BYTES + UPLOAD_OVERHEAD_BYTES))
        .with_state(state)
}
