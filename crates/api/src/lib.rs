//! HTTP API for the pharmacy backend.
//!
//! Provides REST endpoints for registration, login, the drug catalog and
//! orders, with structured logging (tracing) and Prometheus metrics.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use checkout::OrderWorkflow;
use domain::{AccountService, CatalogService, OrderService, SessionIssuer};
use metrics_exporter_prometheus::PrometheusHandle;
use notifications::{
    BotApiChatSender, FanoutConfig, NotificationError, NotificationFanout, SmtpEmailSender,
};
use secrecy::SecretString;
use store::Store;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::NotificationSettings;

/// Shared application state accessible from all handlers.
pub struct AppState<S> {
    pub accounts: AccountService<S>,
    pub sessions: SessionIssuer<S>,
    pub catalog: CatalogService<S>,
    pub orders: OrderService<S>,
    pub checkout: OrderWorkflow<S>,
}

impl<S: Store> AppState<S> {
    /// Wires every service to the same store.
    pub fn new(
        store: S,
        jwt_secret: &SecretString,
        token_ttl: std::time::Duration,
        notifier: NotificationFanout,
    ) -> Self {
        Self {
            accounts: AccountService::new(store.clone()),
            sessions: SessionIssuer::with_ttl(store.clone(), jwt_secret, token_ttl),
            catalog: CatalogService::new(store.clone()),
            orders: OrderService::new(store.clone()),
            checkout: OrderWorkflow::new(store, notifier),
        }
    }
}

/// Builds the notification fan-out from configuration.
///
/// Channels without a transport or recipient are left out.
pub fn build_notifier(
    settings: &NotificationSettings,
) -> Result<NotificationFanout, NotificationError> {
    let mut fanout = NotificationFanout::new(FanoutConfig {
        admin_email: settings.admin_email.clone(),
        chat_recipient: settings.chat_recipient.clone(),
        timeout: settings.timeout,
        max_in_flight: settings.max_in_flight,
    })?;

    match (&settings.smtp, &settings.admin_email) {
        (Some(smtp), Some(_)) => {
            fanout = fanout.with_email(Arc::new(SmtpEmailSender::new(smtp.clone())?));
        }
        _ => tracing::info!("email notifications disabled"),
    }

    match (&settings.chat, &settings.chat_recipient) {
        (Some(chat), Some(_)) => {
            fanout = fanout.with_chat(Arc::new(BotApiChatSender::new(chat.clone())?));
        }
        _ => tracing::info!("chat notifications disabled"),
    }

    Ok(fanout)
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Store>(state: Arc<AppState<S>>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/register", post(routes::accounts::register::<S>))
        .route("/patients", post(routes::accounts::register::<S>))
        .route("/login", post(routes::accounts::login::<S>))
        .route(
            "/account/password",
            put(routes::accounts::change_password::<S>),
        )
        .route(
            "/drugs",
            post(routes::drugs::create::<S>).get(routes::drugs::list::<S>),
        )
        .route("/add-drug", post(routes::drugs::create::<S>))
        .route("/products", get(routes::drugs::list::<S>))
        .route(
            "/drugs/{id}",
            get(routes::drugs::get::<S>)
                .put(routes::drugs::update::<S>)
                .delete(routes::drugs::delete::<S>),
        )
        .route(
            "/orders",
            post(routes::orders::create::<S>).get(routes::orders::list_own::<S>),
        )
        .route("/orders/{id}", put(routes::orders::update_status::<S>))
        .route("/admin/orders", get(routes::orders::list_all::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
