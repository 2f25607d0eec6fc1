use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rbac_token_service::config;
use rbac_token_service::rbac::repository::Repository;
use rbac_token_service::rbac::store::{DynamoStore, Store};
use rbac_token_service::signing::jwks::{JwksPublisher, OidcDiscovery};
use rbac_token_service::signing::jwt::JwtSigner;
use rbac_token_service::signing::kms_client::{AwsKms, KeySigner};
use rbac_token_service::token_endpoint::{StsCallerIdentityVerifier, TokenEndpoint};
use rbac_token_service::{api, AppState};

mod cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "rbac_token_service=info,tower_http=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = config::load()?;
    let args = cli::Cli::parse();
    let port = args.port.unwrap_or(cfg.port);

    tracing::info!("connecting to RBAC store...");
    let store: Arc<dyn Store> = Arc::new(DynamoStore::connect(&cfg.table_name).await?);
    let repository = Arc::new(Repository::new(store));

    tracing::info!("validating key registry configuration...");
    let registry = Arc::new(cfg.build_key_registry()?);

    tracing::info!("connecting to KMS...");
    let signer: Arc<dyn KeySigner> = Arc::new(AwsKms::connect().await?);

    let jwt_signer = Arc::new(JwtSigner::new(registry.clone(), signer.clone(), cfg.jwt_issuer.clone()));

    tracing::info!("publishing JWKS...");
    let jwks = Arc::new(JwksPublisher::build(&registry, signer.as_ref()).await?);
    let discovery = Arc::new(OidcDiscovery::new(cfg.jwt_issuer.clone()));

    let verifier = Arc::new(StsCallerIdentityVerifier::new());
    let token_endpoint = Arc::new(TokenEndpoint::new(
        repository.clone(),
        jwt_signer,
        verifier,
        cfg.default_resource.clone(),
        cfg.jwt_lifetime_minutes,
    ));

    let state = Arc::new(AppState {
        repository,
        token_endpoint,
        jwks,
        discovery,
        config: Arc::new(cfg),
    });

    let app = api::router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("rbac-token-service listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
