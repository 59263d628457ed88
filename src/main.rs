//! Coupon Club billing service entry point.

use std::sync::Arc;
use std::time::Duration;

use tower::ServiceBuilder;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use coupon_club::adapters::document::{
    DocumentIdentityHintRepository, DocumentMemberDirectory, DocumentPartnerDirectory,
    DocumentReferralLinkStore, DocumentSubscriptionRepository, DocumentTransactionRepository,
};
use coupon_club::adapters::http::{billing_router, BillingAppState};
use coupon_club::adapters::postgres::{create_pool, run_migrations};
use coupon_club::adapters::providers::{CardBillingClient, CheckoutClient};
use coupon_club::adapters::{InMemoryDocumentStore, PostgresDocumentStore};
use coupon_club::application::handlers::billing::{
    HandlePaymentWebhookHandler, IdempotencyGuard, IdentityResolver, ListSubscriptionsHandler,
    RegisterCheckoutIntentHandler, SubscriptionLifecycle,
};
use coupon_club::config::{AppConfig, LogFormat};
use coupon_club::domain::billing::WebhookSignatureVerifier;
use coupon_club::ports::DocumentStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    init_tracing(&config);
    config.validate()?;

    let store = open_store(&config).await?;
    let state = build_state(&config, store)?;

    let app = billing_router()
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(config.server.request_timeout())),
        );

    let addr = config.server.socket_addr()?;
    tracing::info!(
        %addr,
        environment = ?config.server.environment,
        provider = %config.billing.webhook_provider,
        "Listening"
    );
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match config.server.log_format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

async fn open_store(
    config: &AppConfig,
) -> Result<Arc<dyn DocumentStore>, Box<dyn std::error::Error>> {
    let Some(url) = config.database.url() else {
        if config.is_production() {
            return Err("database.url is required in production".into());
        }
        tracing::warn!("No database configured; using the in-memory document store");
        return Ok(Arc::new(InMemoryDocumentStore::new()));
    };

    let pool = create_pool(url, &config.database).await?;
    if config.database.run_migrations {
        run_migrations(&pool).await?;
        tracing::info!("Migrations applied");
    }
    Ok(Arc::new(PostgresDocumentStore::new(pool)))
}

fn build_state(
    config: &AppConfig,
    store: Arc<dyn DocumentStore>,
) -> Result<BillingAppState, Box<dyn std::error::Error>> {
    let transactions = Arc::new(DocumentTransactionRepository::new(store.clone()));
    let subscriptions = Arc::new(DocumentSubscriptionRepository::new(store.clone()));
    let hints = Arc::new(DocumentIdentityHintRepository::new(store.clone()));
    let members = Arc::new(DocumentMemberDirectory::new(store.clone()));
    let partners = Arc::new(DocumentPartnerDirectory::new(store.clone()));
    let links = Arc::new(DocumentReferralLinkStore::new(store));

    let resolver = IdentityResolver::new(
        members.clone(),
        hints.clone(),
        transactions.clone(),
        links.clone(),
        partners,
    )
    .with_strategies(config.billing.strategies()?)
    .with_default_partner(config.billing.default_partner());

    let lifecycle =
        SubscriptionLifecycle::new(subscriptions, links.clone(), config.billing.cancel_scope);

    let verifier = config
        .providers
        .webhook_secret
        .clone()
        .map(WebhookSignatureVerifier::new);
    if verifier.is_none() {
        tracing::warn!("No webhook secret configured; signatures are not verified");
    }

    let webhook = HandlePaymentWebhookHandler::new(
        config.billing.webhook_provider,
        Arc::new(resolver),
        IdempotencyGuard::new(transactions),
        Arc::new(lifecycle),
    )
    .with_verifier(verifier);

    let provider_timeout = Duration::from_secs(config.providers.request_timeout_secs);
    let card = CardBillingClient::new(
        config.providers.card_api_key.clone(),
        config.providers.card_api_base.clone(),
        provider_timeout,
    );
    let checkout = CheckoutClient::new(
        config.providers.checkout_api_base.clone(),
        config.providers.checkout_api_token.clone(),
        provider_timeout,
    );

    Ok(BillingAppState {
        webhook_handler: Arc::new(webhook),
        list_subscriptions_handler: Arc::new(ListSubscriptionsHandler::new(
            members.clone(),
            Arc::new(card),
            Arc::new(checkout),
        )),
        checkout_intent_handler: Arc::new(RegisterCheckoutIntentHandler::new(
            hints,
            links,
            members,
            config.billing.hint_ttl_minutes,
        )),
        webhook_token: config.providers.webhook_token.clone().map(Arc::new),
    })
}
