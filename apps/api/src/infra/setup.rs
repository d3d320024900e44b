use crate::{
    adapters::{http::app_state::AppState, persistence::PostgresPersistence},
    application::{
        jwt::{AccessVerifier, JwtAccessVerifier},
        ports::payment_gateway::PaymentGateway,
        use_cases::{
            ledger::{BillingUserRepo, PaymentRepo, ProcessedEventRepo, PropertyRepo},
            payments::PaymentUseCases,
            reconciliation::WebhookReconciler,
        },
    },
    infra::{
        config::AppConfig,
        db::{init_db, run_migrations},
        error::InfraError,
        stripe_client::StripeClient,
        stripe_payment_adapter::StripePaymentAdapter,
    },
};
use secrecy::{ExposeSecret, SecretString};
use std::fs::File;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub async fn init_app_state() -> anyhow::Result<AppState> {
    let config = AppConfig::from_env();
    init_tracing(&config.log_file);

    let pool = init_db(&config.database_url, config.db_max_connections).await?;
    if config.run_migrations {
        run_migrations(&pool).await?;
    }
    let postgres_arc = Arc::new(PostgresPersistence::new(pool));

    let stripe_client = StripeClient::new(
        copy_secret(&config.stripe_secret_key),
        config.stripe_api_base.as_str(),
        config.gateway_timeout,
    )
    .map_err(InfraError::HttpClient)?;
    let gateway: Arc<dyn PaymentGateway> = Arc::new(StripePaymentAdapter::new(
        stripe_client,
        copy_secret(&config.stripe_webhook_secret),
        config.webhook_tolerance_secs,
    ));

    let payment_repo_arc = postgres_arc.clone() as Arc<dyn PaymentRepo>;
    let user_repo_arc = postgres_arc.clone() as Arc<dyn BillingUserRepo>;
    let property_repo_arc = postgres_arc.clone() as Arc<dyn PropertyRepo>;
    let event_repo_arc = postgres_arc as Arc<dyn ProcessedEventRepo>;

    let payment_use_cases = PaymentUseCases::new(
        payment_repo_arc.clone(),
        user_repo_arc.clone(),
        property_repo_arc.clone(),
        gateway.clone(),
        config.late_fee_policy,
    );

    let reconciler = WebhookReconciler::new(
        gateway,
        payment_repo_arc,
        user_repo_arc,
        property_repo_arc,
        event_repo_arc,
    );

    let access_verifier: Arc<dyn AccessVerifier> = Arc::new(JwtAccessVerifier::new(
        copy_secret(&config.jwt_secret),
        config.jwt_leeway_secs,
    ));

    Ok(AppState {
        config: Arc::new(config),
        payment_use_cases: Arc::new(payment_use_cases),
        reconciler: Arc::new(reconciler),
        access_verifier,
    })
}

fn copy_secret(secret: &SecretString) -> SecretString {
    SecretString::new(secret.expose_secret().into())
}

/// Safe to call more than once; later calls keep the first subscriber.
pub fn init_tracing(log_file: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "rentflow_api=debug,tower_http=debug".into());

    // Console (pretty logs)
    let console_layer = fmt::layer()
        .with_target(false) // don’t show target (module path)
        .with_level(true) // show log level
        .pretty(); // human-friendly, with colors

    // File (structured JSON logs), skipped when the file cannot be created
    let json_layer = match File::create(log_file) {
        Ok(file) => Some(
            fmt::layer()
                .json()
                .with_writer(file)
                .with_current_span(true)
                .with_span_list(true),
        ),
        Err(e) => {
            eprintln!("cannot create log file {log_file}: {e}");
            None
        }
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(json_layer)
        .try_init()
        .ok();
}
