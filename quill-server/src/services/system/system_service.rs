use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Extension, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, SecondsFormat, Utc};
use quill_auth::directory::USERS_COLLECTION;
use quill_auth::secrets::SecretSource;
use quill_axum::{QuillState, Tenant};
use quill_core::Filter;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::services::posts::POSTS_COLLECTION;
use crate::services::types::CmsState;

pub const HEALTH_DEADLINE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    /// Unhealthy when the store or the secret store cannot be read. A secret
    /// generated in-process is lost on restart unless the store keeping it
    /// is durable, and a tenant with no secret yet will get such a one at
    /// its first login.
    pub fn decide(
        database_connected: bool,
        secret_readable: bool,
        source: Option<SecretSource>,
        durable: bool,
    ) -> Self {
        if !database_connected || !secret_readable {
            return HealthStatus::Unhealthy;
        }
        match source {
            None | Some(SecretSource::Generated) if !durable => HealthStatus::Degraded,
            _ => HealthStatus::Healthy,
        }
    }
}

/// Go-style duration text, e.g. `1h2m3.5s`.
pub fn format_uptime(d: Duration) -> String {
    let total_ms = d.as_millis();
    if total_ms < 1000 {
        return format!("{total_ms}ms");
    }
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms / 60_000) % 60;
    let millis = total_ms % 60_000;
    let seconds = if millis % 1000 == 0 {
        format!("{}", millis / 1000)
    } else {
        format!("{}.{:03}", millis / 1000, millis % 1000)
            .trim_end_matches('0')
            .to_string()
    };

    let mut out = String::new();
    if hours > 0 {
        out.push_str(&format!("{hours}h"));
    }
    if hours > 0 || minutes > 0 {
        out.push_str(&format!("{minutes}m"));
    }
    out.push_str(&seconds);
    out.push('s');
    out
}

fn rfc3339(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub async fn version(
    State(state): State<QuillState>,
    Extension(cms): Extension<Arc<CmsState>>,
) -> Json<Value> {
    let version = match tokio::fs::read_to_string(&cms.version_file).await {
        Ok(raw) if !raw.trim().is_empty() => raw.trim().to_string(),
        Ok(_) => "unknown".to_string(),
        Err(err) => {
            debug!(error = %err, file = %cms.version_file.display(), "no version file");
            "unknown".to_string()
        }
    };
    Json(json!({
        "version": version,
        "uptime": format_uptime(state.uptime()),
        "started": rfc3339(DateTime::<Utc>::from(state.started_at)),
    }))
}

/// Health of the request's tenant: store reachability, document counts and
/// the state of its signing secret.
pub async fn health(State(state): State<QuillState>, Tenant(tenant): Tenant) -> (StatusCode, Json<Value>) {
    let database_connected = match state.data.ping(HEALTH_DEADLINE).await {
        Ok(()) => true,
        Err(err) => {
            warn!(tenant = %tenant.id, error = %err, "store ping failed");
            false
        }
    };

    let (mut posts_count, mut users_count) = (None, None);
    if database_connected {
        let all = Filter::new();
        let posts = state
            .data
            .collection_for(Some(&tenant), POSTS_COLLECTION)
            .with_timeout(HEALTH_DEADLINE);
        let users = state
            .data
            .collection_for(Some(&tenant), USERS_COLLECTION)
            .with_timeout(HEALTH_DEADLINE);
        posts_count = posts.count_documents(&all).await.ok();
        users_count = users.count_documents(&all).await.ok();
    }

    // inspect only: a health check must not mint secrets for unknown tenants
    let (secret_readable, secret) = match state.secrets.inspect(&tenant.id).await {
        Ok(source) => (true, source),
        Err(err) => {
            warn!(tenant = %tenant.id, error = %err, "signing secret unavailable");
            (false, None)
        }
    };
    let durable = state.secrets.store_is_durable();
    let status = HealthStatus::decide(database_connected, secret_readable, secret, durable);
    let code = if status == HealthStatus::Unhealthy {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    (
        code,
        Json(json!({
            "status": status,
            "timestamp": rfc3339(Utc::now()),
            "uptime": format_uptime(state.uptime()),
            "tenant": tenant.id.as_str(),
            "database": tenant.database,
            "database_connected": database_connected,
            "posts_count": posts_count,
            "users_count": users_count,
            "secret": { "source": secret, "durable": durable },
        })),
    )
}
