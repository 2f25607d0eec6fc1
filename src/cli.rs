use clap::Parser;

/// OAuth token service — AWS-caller-identity RBAC authorization and
/// KMS-backed JWT issuance.
#[derive(Parser)]
#[command(name = "rbac-token-service", version, about)]
pub struct Cli {
    /// Port to bind, overriding the PORT environment variable.
    #[arg(short, long)]
    pub port: Option<u16>,
}
