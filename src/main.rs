use std::sync::Arc;

use sqlx::sqlite::SqlitePoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bookwell::{
    api,
    cache::NoopCacheInvalidator,
    config::Settings,
    notifications::{LogNotifier, Notifier, OutboxWorker, WebhookNotifier},
    payments::{PaymentGateway, StripeGateway, UnconfiguredGateway},
    service::ServiceContext,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bookwell=debug,tower_http=debug,axum=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let settings = Settings::new().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config: {}. Using defaults.", e);
        Settings::default()
    });

    tracing::info!(
        "Starting Bookwell server on {}:{}",
        settings.server.host,
        settings.server.port
    );

    // Initialize database
    let db_pool = SqlitePoolOptions::new()
        .max_connections(settings.database.max_connections)
        .connect(&settings.database.url)
        .await?;

    // Run migrations
    sqlx::migrate!("./migrations").run(&db_pool).await?;

    // Payment gateway: Stripe when configured, otherwise a stub that fails
    // refund attempts loudly without blocking cancellations.
    let gateway: Arc<dyn PaymentGateway> = if settings.stripe.enabled {
        match settings.stripe.secret_key.clone() {
            Some(api_key) => {
                tracing::info!("Stripe payment processing enabled");
                Arc::new(StripeGateway::new(
                    api_key,
                    std::time::Duration::from_secs(settings.stripe.timeout_secs),
                ))
            }
            None => {
                tracing::warn!("Stripe enabled but missing configuration");
                Arc::new(UnconfiguredGateway)
            }
        }
    } else {
        tracing::info!("Stripe payment processing disabled");
        Arc::new(UnconfiguredGateway)
    };

    // Create service context
    let service_context = Arc::new(ServiceContext::new(
        db_pool.clone(),
        settings.booking.clone(),
        gateway,
        Arc::new(NoopCacheInvalidator),
    ));

    // Notification delivery: POST to the configured relay, or log-only.
    let notifier: Arc<dyn Notifier> = match settings.notifications.webhook_url.clone() {
        Some(url) => Arc::new(WebhookNotifier::new(
            url,
            std::time::Duration::from_secs(10),
        )),
        None => Arc::new(LogNotifier),
    };
    OutboxWorker::new(
        service_context.outbox_repo.clone(),
        notifier,
        settings.notifications.clone(),
    )
    .spawn();

    // Create API app
    let app = api::create_app(service_context, Arc::new(settings.clone()));

    let listener = tokio::net::TcpListener::bind(format!(
        "{}:{}",
        settings.server.host, settings.server.port
    ))
    .await?;

    tracing::info!(
        "Server listening on http://{}:{}",
        settings.server.host,
        settings.server.port
    );

    axum::serve(listener, app).await?;

    Ok(())
}
