/// certmill binary: thin CLI over the library driver
use certmill::{CertSpec, Config, Driver};
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

const APP_TAG: &str = "certmill";

#[derive(Parser)]
#[command(name = "certmill")]
#[command(about = "Obtain and renew ACME certificates, unattended", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file path (TOML)
    #[arg(short, long, default_value = "certmill.toml")]
    config: String,

    /// Domains for a single certificate, overriding the config's specs;
    /// the first name is the primary
    #[arg(short, long)]
    domains: Vec<String>,

    /// Agree to the CA's terms of service
    #[arg(long)]
    accept_terms: bool,

    /// Challenge type (http-01, dns-01)
    #[arg(long)]
    challenge: Option<String>,

    /// Request the OCSP-must-staple extension
    #[arg(long)]
    must_staple: bool,

    /// Reissue even when the installed certificate would serve
    #[arg(long)]
    force_reissue: bool,

    /// Discard local account state and register afresh
    #[arg(long)]
    reset_account: bool,

    /// Run without the single-instance lockfile
    #[arg(long)]
    no_lock: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cli.log_level.clone())),
        )
        .init();

    if let Err(err) = run(cli).await {
        error!("{}: fatal: {}", APP_TAG, err);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> certmill::Result<()> {
    let mut config = Config::load(&cli.config).await?;

    if !cli.domains.is_empty() {
        let mut domains = cli.domains.clone();
        let primary = domains.remove(0);
        config.certificates.specs = vec![CertSpec {
            primary,
            sans: domains,
        }];
    }
    if cli.accept_terms {
        config.account.accept_terms = true;
    }
    if let Some(challenge) = cli.challenge {
        config.challenge.challenge_type = challenge;
    }
    if cli.must_staple {
        config.certificates.must_staple = true;
    }
    if cli.force_reissue {
        config.certificates.force_reissue = true;
    }
    if cli.reset_account {
        config.account.reset = true;
    }
    if cli.no_lock {
        config.lock.enabled = false;
    }
    config.validate()?;

    Driver::new(config).run().await
}
