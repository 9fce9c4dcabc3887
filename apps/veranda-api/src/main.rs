mod error;
mod handlers;
mod services;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::http::{HeaderValue, header};
use axum::routing::{get, post};
use clap::{Parser, Subcommand};
use sqlx::PgPool;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use veranda_db::repositories::room_repo::RoomRepository;

use crate::services::availability::AvailabilityService;
use crate::services::booking::BookingService;
use crate::services::coupons::CouponService;
use crate::services::payment::PaymentGateway;
use crate::services::payment::razorpay::RazorpayGateway;
use crate::services::pricing::PricingService;
use crate::services::settings::SettingsService;
use crate::services::sweeper::SweeperService;

#[derive(Parser)]
#[command(name = "veranda-api", about = "Reservation and pricing API server")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API server with the background hold sweeper.
    Serve,
    /// Release expired unpaid holds once and exit.
    Sweep,
}

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub rooms: RoomRepository,
    pub settings: SettingsService,
    pub availability: AvailabilityService,
    pub pricing: PricingService,
    pub coupons: CouponService,
    pub booking: BookingService,
    pub gateway: Arc<dyn PaymentGateway>,
}

impl AppState {
    fn new(pool: PgPool, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self {
            rooms: RoomRepository::new(pool.clone()),
            settings: SettingsService::new(pool.clone()),
            availability: AvailabilityService::new(pool.clone()),
            pricing: PricingService::new(pool.clone()),
            coupons: CouponService::new(pool.clone()),
            booking: BookingService::new(pool.clone(), gateway.clone()),
            gateway,
            pool,
        }
    }
}

fn env_var(name: &str) -> Result<String> {
    std::env::var(name).with_context(|| format!("{name} is not set"))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let log_dir = std::env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string());
    let file_appender = tracing_appender::rolling::daily(&log_dir, "veranda-api.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "veranda_api=debug,axum=info,tower_http=info,sqlx=warn".into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false),
        )
        .init();

    let cli = Cli::parse();

    let database_url = env_var("DATABASE_URL")?;
    let pool = veranda_db::connect(&database_url).await?;

    match cli.command {
        Command::Serve => serve(pool).await,
        Command::Sweep => {
            let released = SweeperService::new(pool).sweep().await?;
            info!(released, "Sweep finished");
            Ok(())
        }
    }
}

async fn serve(pool: PgPool) -> Result<()> {
    let gateway: Arc<dyn PaymentGateway> = Arc::new(RazorpayGateway::new(
        env_var("RAZORPAY_KEY_ID")?,
        env_var("RAZORPAY_KEY_SECRET")?,
        env_var("RAZORPAY_WEBHOOK_SECRET")?,
    )?);

    let state = AppState::new(pool.clone(), gateway);

    tokio::spawn(SweeperService::new(pool).run());

    let app = axum::Router::new()
        .route("/api/rooms", get(handlers::rooms::list))
        .route("/api/rooms/{slug}", get(handlers::rooms::by_slug))
        .route("/api/settings", get(handlers::settings::get))
        .route("/api/availability", post(handlers::availability::check))
        .route("/api/price", post(handlers::pricing::quote))
        .route("/api/coupons/validate", post(handlers::coupons::validate))
        .route("/api/orders", post(handlers::orders::create))
        .route("/api/payments/verify", post(handlers::payments::verify))
        .route("/api/webhooks/razorpay", post(handlers::webhook::razorpay))
        .route("/api/bookings/{reference}", get(handlers::bookings::by_reference))
        .layer(RequestBodyLimitLayer::new(64 * 1024))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "8080".to_string())
        .parse()
        .context("PORT is not a valid port number")?;
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(%addr, "API server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("Server error")?;

    Ok(())
}
