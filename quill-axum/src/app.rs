use std::path::Path;

use axum::middleware::from_fn_with_state;
use axum::Router;
use tokio::net::{TcpListener, ToSocketAddrs};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::middlewares::tenant::{guard_fallback_writes, resolve_tenant};
use crate::state::{AppContext, QuillState};

pub struct QuillApp {
    pub state: QuillState,
    routes: Router<QuillState>,
}

impl QuillApp {
    pub fn new(ctx: AppContext) -> Self {
        Self {
            state: QuillState::new(ctx),
            routes: Router::new(),
        }
    }

    pub fn use_router(mut self, path: &str, router: Router<QuillState>) -> Self {
        self.routes = self.routes.nest(path, router);
        self
    }

    /// Serve files under `dir` at `path`.
    pub fn use_static(mut self, path: &str, dir: impl AsRef<Path>) -> Self {
        self.routes = self.routes.nest_service(path, ServeDir::new(dir));
        self
    }

    /// The finished router. Requests pass CORS, request id and tracing, tenant
    /// resolution and the fallback write guard before any route-level layer.
    pub fn into_router(self) -> Router {
        let state = self.state;
        let cors = state.cors.layer();
        self.routes
            .layer(from_fn_with_state(state.clone(), guard_fallback_writes))
            .layer(from_fn_with_state(state.clone(), resolve_tenant))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(cors)
            .with_state(state)
    }

    pub async fn listen<A>(self, addr: A) -> anyhow::Result<()>
    where
        A: ToSocketAddrs,
    {
        let listener = TcpListener::bind(addr).await?;
        info!(addr = %listener.local_addr()?, "listening");
        axum::serve(listener, self.into_router())
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        info!("server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "could not install ctrl-c handler");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
