use std::sync::Arc;
use std::time::Duration;

use axum::{
    routing::{any, get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    config::Config,
    error::DemoAccessError,
    middleware::rate_limiter::{
        api_rate_limit_middleware, contact_rate_limit_middleware,
        demo_access_rate_limit_middleware, ApiLimiter, ContactLimiter, DemoAccessLimiter,
    },
    proxy::DemoProxy,
    routes::{
        catalog::{get_app, list_apps, list_testimonials},
        contact::submit_contact,
        demo::{proxy_demo, proxy_demo_root, request_demo_access},
        health::health_check,
        payments::{create_payment_intent, stripe_webhook},
    },
    services::{
        issuer::SessionIssuer, mailer::Mailer, payments::PaymentClient, quota::QuotaGate,
        validator::SessionValidator,
    },
    storage::Storage,
    utils::net::ClientIdentity,
    utils::rate_limiter::RateLimiter,
};

#[derive(Clone)]
pub struct AppContext {
    pub storage: Arc<dyn Storage>,
    pub config: Config,
    pub issuer: Arc<SessionIssuer>,
    pub validator: Arc<SessionValidator>,
    pub proxy: Arc<DemoProxy>,
    pub payments: Arc<PaymentClient>,
    pub mailer: Arc<Mailer>,
    pub identity: ClientIdentity,
    pub api_limiter: ApiLimiter,
    pub demo_access_limiter: DemoAccessLimiter,
    pub contact_limiter: ContactLimiter,
}

impl AppContext {
    pub fn new(config: Config, storage: Arc<dyn Storage>) -> Result<Self, DemoAccessError> {
        let gate = QuotaGate::new(config.demo.quota_caps());
        let issuer = Arc::new(SessionIssuer::new(
            storage.clone(),
            gate,
            config.demo.session_minutes,
        ));
        let validator = Arc::new(SessionValidator::new(storage.clone()));
        let proxy = Arc::new(DemoProxy::new(&config.demo.proxy_user_agent)?);
        let payments = Arc::new(PaymentClient::new(&config.payments));
        let mailer = Arc::new(Mailer::new(&config.mail));
        let identity = ClientIdentity::new(config.server.trust_proxy);

        let api_limiter = ApiLimiter(RateLimiter::per_minute(
            config.demo.api_requests_per_minute,
        ));
        let demo_access_limiter = DemoAccessLimiter(RateLimiter::new(
            config.demo.issuance_calls_per_day,
            Duration::from_secs(24 * 60 * 60),
        ));
        let contact_limiter = ContactLimiter(RateLimiter::new(
            config.demo.contact_requests_per_window,
            Duration::from_secs(15 * 60),
        ));

        Ok(Self {
            storage,
            config,
            issuer,
            validator,
            proxy,
            payments,
            mailer,
            identity,
            api_limiter,
            demo_access_limiter,
            contact_limiter,
        })
    }
}

#[derive(OpenApi)]
#[openapi(
    info(title = "Demo Gateway API", version = "1.0.0"),
    paths(
        crate::routes::health::health_check,
        crate::routes::catalog::list_apps,
        crate::routes::catalog::get_app,
        crate::routes::catalog::list_testimonials,
        crate::routes::contact::submit_contact,
        crate::routes::demo::request_demo_access,
        crate::routes::payments::create_payment_intent,
        crate::routes::payments::stripe_webhook,
    ),
    components(schemas(
        crate::models::app::App,
        crate::models::app::AppSummary,
        crate::models::testimonial::Testimonial,
        crate::models::requests::ContactForm,
        crate::models::requests::PaymentIntentRequest,
        crate::models::responses::DemoAccessGranted,
    ))
)]
struct ApiDoc;

pub fn create_api_router(context: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(
            context
                .config
                .server
                .cors_origins
                .iter()
                .filter_map(|origin| origin.parse().ok())
                .collect::<Vec<_>>(),
        )
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([axum::http::header::CONTENT_TYPE, axum::http::header::ACCEPT]);

    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/apps", get(list_apps))
        .route("/api/apps/{id}", get(get_app))
        .route("/api/testimonials", get(list_testimonials))
        .route(
            "/api/contact",
            post(submit_contact)
                .route_layer(axum::middleware::from_fn(contact_rate_limit_middleware))
                .route_layer(axum::Extension(context.contact_limiter.clone())),
        )
        .route(
            "/api/demo-access/{app_id}",
            post(request_demo_access)
                .route_layer(axum::middleware::from_fn(demo_access_rate_limit_middleware))
                .route_layer(axum::Extension(context.demo_access_limiter.clone())),
        )
        .route("/api/demo-proxy/{token}", any(proxy_demo_root))
        .route("/api/demo-proxy/{token}/{*path}", any(proxy_demo))
        .route("/api/create-payment-intent", post(create_payment_intent))
        .route("/api/webhook/stripe", post(stripe_webhook))
        .merge(SwaggerUi::new("/swagger-ui").url("/docs/openapi.json", ApiDoc::openapi()))
        .layer(axum::middleware::from_fn(api_rate_limit_middleware))
        .layer(axum::Extension(context.api_limiter.clone()))
        .layer(axum::Extension(context.identity))
        .layer(cors)
        .with_state(context)
}
