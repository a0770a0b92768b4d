use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub mod admin;
pub mod api;
pub mod assistant;
pub mod clock;
pub mod email;
pub mod mailer;
pub mod pricing;
pub mod reset;
pub mod settings;
pub mod startup_checks;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    pub app: AppConfig,
    pub settings: SettingsConfig,
    #[serde(default)]
    pub llm: assistant::LlmConfig,
    #[serde(default)]
    pub admin: AdminConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub name: String,
    pub log_level: String,
    /// Signs admin bearer tokens.
    pub secret: String,
    #[serde(default)]
    pub environment: Environment,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SettingsConfig {
    pub path: PathBuf,
}

/// Bootstrap admin account. The password here only applies until one is
/// set through the reset flow.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AdminConfig {
    pub email: String,
    #[serde(default)]
    pub password: Option<String>,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            email: "admin@vyomai.cloud".to_string(),
            password: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 3000,
            },
            app: AppConfig {
                name: "VyomAi".to_string(),
                log_level: "info".to_string(),
                secret: "change-me-in-production".to_string(),
                environment: Environment::Development,
            },
            settings: SettingsConfig {
                path: PathBuf::from("settings.toml"),
            },
            llm: assistant::LlmConfig::default(),
            admin: AdminConfig::default(),
        }
    }
}

use axum::{
    Router,
    routing::{get, post, put},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use assistant::{DynCompletionClient, OpenAiClient, ReplyWriter};
use clock::{DynClock, SystemClock};
use email::{
    DynEmailProvider, EmailConfigService, EmailDispatcher, EmailError, EmailSecrets,
    create_providers,
};
use mailer::Mailer;
use pricing::PriceConverter;
use reset::ResetCodeStore;
use settings::{DynSettingsStore, FileSettingsStore};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub settings: DynSettingsStore,
    pub mailer: Arc<Mailer>,
    pub pricing: Arc<PriceConverter>,
    pub clock: DynClock,
}

impl AppState {
    /// Wires the services from explicit parts.
    pub fn new(
        config: Config,
        settings: DynSettingsStore,
        providers: Vec<DynEmailProvider>,
        llm: DynCompletionClient,
        clock: DynClock,
    ) -> Result<Self, EmailError> {
        let email_config = Arc::new(EmailConfigService::new(settings.clone(), clock.clone()));
        let dispatcher = Arc::new(EmailDispatcher::new(providers));
        let replies = ReplyWriter::new(llm.clone(), config.app.name.clone());
        let reset_codes = Arc::new(ResetCodeStore::new(clock.clone()));

        let mailer = Mailer::new(
            email_config,
            dispatcher,
            replies,
            reset_codes,
            config.app.environment,
        )?;

        Ok(Self {
            config: Arc::new(config),
            settings,
            mailer: Arc::new(mailer),
            pricing: Arc::new(PriceConverter::new(llm)),
            clock,
        })
    }

    /// Production wiring: settings file, real providers and secrets from the
    /// environment.
    pub fn from_config(mut config: Config) -> Result<Self, EmailError> {
        if let Some(password) = email::env_var("ADMIN_PASSWORD") {
            config.admin.password = Some(password);
        }

        let settings = Arc::new(FileSettingsStore::new(config.settings.path.clone()));
        let providers = create_providers(&EmailSecrets::from_env());
        let llm = Arc::new(OpenAiClient::from_env(config.llm.clone()));

        Self::new(config, settings, providers, llm, Arc::new(SystemClock))
    }
}

pub fn create_router(app_state: AppState) -> Router {
    let admin_routes = Router::new()
        .route("/login", post(admin::login_handler))
        .route("/forgot-password", post(admin::forgot_password_handler))
        .route("/reset-password", post(admin::reset_password_handler))
        .route(
            "/settings",
            get(admin::get_settings_handler).put(admin::put_settings_handler),
        )
        .route("/content/{section}", put(admin::put_content_handler))
        .route("/email/status", get(admin::email_status_handler))
        .route("/email/test", post(admin::email_test_handler))
        .route("/pricing/convert", post(admin::convert_price_handler));

    Router::new()
        .route("/health", get(api::health_handler))
        .route("/api/contact", post(api::contact_handler))
        .route("/api/bookings", post(api::booking_handler))
        .route("/api/pricing-request", post(api::pricing_request_handler))
        .route("/api/content", get(api::content_handler))
        .nest("/api/admin", admin_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    let method = request.method();
                    let uri = request.uri();
                    let matched_path = request
                        .extensions()
                        .get::<axum::extract::MatchedPath>()
                        .map(|matched_path| matched_path.as_str());

                    tracing::info_span!(
                        "http_request",
                        method = %method,
                        uri = %uri,
                        matched_path,
                    )
                })
                .on_request(|request: &axum::http::Request<_>, _span: &tracing::Span| {
                    let user_agent = request
                        .headers()
                        .get("user-agent")
                        .and_then(|h| h.to_str().ok())
                        .unwrap_or("-");

                    tracing::info!(
                        target: "access_log",
                        method = %request.method(),
                        path = %request.uri().path(),
                        user_agent = %user_agent,
                        "request"
                    );
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     _span: &tracing::Span| {
                        tracing::info!(
                            target: "access_log",
                            status = %response.status(),
                            latency_ms = %latency.as_millis(),
                            "response"
                        );
                    },
                ),
        )
        .with_state(app_state)
}

pub async fn create_app(config: Config) -> Result<Router, EmailError> {
    Ok(create_router(AppState::from_config(config)?))
}
