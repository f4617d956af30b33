use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// GET /health
/// Service version plus database and Redis pings.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    let database = match sqlx::query("SELECT 1").execute(&state.db).await {
        Ok(_) => "ok",
        Err(e) => {
            tracing::warn!("Health check database ping failed: {e}");
            "unavailable"
        }
    };

    let redis = match ping_redis(&state.redis).await {
        Ok(()) => "ok",
        Err(e) => {
            tracing::warn!("Health check redis ping failed: {e}");
            "unavailable"
        }
    };

    let healthy = database == "ok" && redis == "ok";
    Json(json!({
        "status": if healthy { "ok" } else { "degraded" },
        "version": env!("CARGO_PKG_VERSION"),
        "service": "jobboard-api",
        "database": database,
        "redis": redis,
        "scheduler_running": state.automation.is_scheduled().await
    }))
}

async fn ping_redis(client: &redis::Client) -> redis::RedisResult<()> {
    let mut conn = client.get_multiplexed_async_connection().await?;
    redis::cmd("PING").query_async::<_, String>(&mut conn).await?;
    Ok(())
}
