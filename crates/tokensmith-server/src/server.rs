use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    extract::FromRef,
    routing::{get, post},
};
use tokensmith_auth::{AuthenticationService, TokenState};
use tower_http::trace::TraceLayer;

use crate::ServerError;
use crate::config::AppConfig;
use crate::handlers;
use crate::users::{self, User, UserDirectory};

/// State shared by the demo handlers and the token extractors.
#[derive(Clone, FromRef)]
pub struct AppState {
    pub tokens: TokenState<User>,
    pub users: UserDirectory,
}

/// Creates the user directory and token service described by `cfg`.
pub fn build_state(cfg: &AppConfig) -> Result<AppState, ServerError> {
    let users = UserDirectory::from_seeds(&cfg.users)?;
    let registry = users::registry(&users, &cfg.tokens)?;
    let service = AuthenticationService::new(cfg.tokens.clone(), registry)?;
    Ok(AppState {
        tokens: TokenState::new(Arc::new(service)),
        users,
    })
}

pub fn build_router(state: AppState, cfg: &AppConfig) -> Router {
    let prefix = cfg
        .tokens
        .url_prefix
        .as_deref()
        .unwrap_or("")
        .trim_end_matches('/');

    let token_routes = tokensmith_auth::http::routes(state.tokens.clone(), &cfg.tokens);

    Router::new()
        .route("/", get(handlers::root))
        .route("/healthz", get(handlers::healthz))
        .route("/protected", get(handlers::protected))
        .route(&format!("{prefix}/auth/revoke"), post(handlers::revoke))
        .with_state(state)
        .merge(token_routes)
        .layer(
            TraceLayer::new_for_http().make_span_with(|req: &axum::http::Request<_>| {
                tracing::info_span!(
                    "http.request",
                    http.method = %req.method(),
                    http.target = %req.uri(),
                )
            }),
        )
}

pub fn build_app(cfg: &AppConfig) -> Result<Router, ServerError> {
    let state = build_state(cfg)?;
    Ok(build_router(state, cfg))
}

pub struct TokensmithServer {
    addr: SocketAddr,
    app: Router,
}

pub struct ServerBuilder {
    addr: SocketAddr,
    config: AppConfig,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        let cfg = AppConfig::default();
        Self {
            addr: cfg.addr(),
            config: cfg,
        }
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.addr = cfg.addr();
        self.config = cfg;
        self
    }

    pub fn build(self) -> Result<TokensmithServer, ServerError> {
        let app = build_app(&self.config)?;
        Ok(TokensmithServer {
            addr: self.addr,
            app,
        })
    }
}

impl TokensmithServer {
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
