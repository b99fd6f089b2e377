use crate::call::{BookingSink, CallController, ControllerSettings};
use crate::config::Config;
use crate::llm::{Extractor, LlmExtractor, OpenAiClientBuilder};
use crate::session::SessionStore;
use crate::telephony::{TelephonyClient, TwilioClient};
use crate::twiml::TwimlOptions;
use anyhow::Result;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

pub struct AppStateInner {
    pub config: Arc<Config>,
    pub controller: CallController,
    pub telephony: Arc<dyn TelephonyClient>,
    pub twiml: TwimlOptions,
    pub token: CancellationToken,
}

pub type AppState = Arc<AppStateInner>;

pub struct AppStateBuilder {
    pub config: Option<Config>,
    pub extractor: Option<Arc<dyn Extractor>>,
    pub telephony: Option<Arc<dyn TelephonyClient>>,
    pub bookings: Option<Arc<dyn BookingSink>>,
}

impl AppStateBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            extractor: None,
            telephony: None,
            bookings: None,
        }
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    pub fn extractor(mut self, extractor: Arc<dyn Extractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn telephony(mut self, telephony: Arc<dyn TelephonyClient>) -> Self {
        self.telephony = Some(telephony);
        self
    }

    pub fn bookings(mut self, bookings: Arc<dyn BookingSink>) -> Self {
        self.bookings = Some(bookings);
        self
    }

    pub async fn build(self) -> Result<AppState> {
        let config = Arc::new(self.config.unwrap_or_default());
        if config.sms_confirmation {
            warn!("sms_confirmation is enabled but text confirmations are not supported, ignoring");
        }

        let extractor = match self.extractor {
            Some(extractor) => extractor,
            None => {
                let client = OpenAiClientBuilder::from_config(&config.llm).build()?;
                Arc::new(LlmExtractor::new(Arc::new(client), config.llm.timeout()))
            }
        };
        let telephony = self
            .telephony
            .unwrap_or_else(|| Arc::new(TwilioClient::new(config.twilio.clone())));

        let sessions = Arc::new(SessionStore::new(
            config.sessions.max_sessions,
            Duration::from_secs(config.sessions.idle_timeout_secs),
        ));
        let mut controller =
            CallController::new(sessions, extractor, ControllerSettings::from_config(&config));
        if let Some(bookings) = self.bookings {
            controller = controller.with_bookings(bookings);
        }

        Ok(Arc::new(AppStateInner {
            twiml: TwimlOptions::from_config(&config),
            config,
            controller,
            telephony,
            token: CancellationToken::new(),
        }))
    }
}

pub async fn run(state: AppState) -> Result<()> {
    let token = state.token.clone();
    let app = create_router(state.clone());
    let addr: SocketAddr = state.config.http_addr.parse()?;
    let listener = match TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!("Failed to bind to {}: {}", addr, e);
            return Err(anyhow::anyhow!("Failed to bind to {}: {}", addr, e));
        }
    };
    info!(
        "listening on {}, webhooks at {}",
        addr,
        state.twiml.url(crate::twiml::INCOMING_PATH)
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(token.clone().cancelled_owned())
        .await
        .map_err(|e| {
            tracing::error!("Server error: {}", e);
            anyhow::anyhow!("Server error: {}", e)
        })?;
    info!("Server shut down gracefully");
    token.cancel();
    Ok(())
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::any())
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
            axum::http::header::ACCEPT,
        ]);

    crate::handler::router()
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
