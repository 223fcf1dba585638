//! `nexusd`: the Nexus EBICS middleware process. `serve` runs the HTTP API
//! and the background scheduler; the remaining subcommands are the
//! operator tools spec.md §6 calls for (`reset-tables`, `superuser`) plus
//! two debugging aids used while wiring up a new bank connection
//! (`gen-pain`, `parse-camt`).

use anyhow::Context;
use clap::{Parser, Subcommand};
use nexus_ebics::EbicsTransport;
use nexus_ledger::{Database, NoopFacadeBus};
use nexus_scheduler::Scheduler;
use nexus_service::clock::SystemClock;
use nexus_service::config::Config;
use nexus_service::notify::AccountNotifiers;
use nexus_service::scheduler_handler::ServiceTaskHandler;
use nexus_service::state::AppState;
use nexus_service::{auth, routes};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "nexusd", version, about = "Nexus EBICS/ISO 20022 banking middleware")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP API and the background fetch/submit scheduler.
    Serve {
        /// Port to listen on, overriding `server.port`.
        #[arg(long)]
        port: Option<u16>,
        /// Bind only to 127.0.0.1, ignoring `server.host`.
        #[arg(long)]
        localhost_only: bool,
        /// Bind `0.0.0.0` instead of `::`, for hosts without IPv6.
        #[arg(long)]
        ipv4_only: bool,
        /// Serve over a Unix domain socket instead of TCP.
        #[arg(long)]
        unix_socket: Option<PathBuf>,
    },
    /// Truncate every table this service owns. Development and test
    /// fixtures only.
    ResetTables,
    /// Create or replace a user's credentials.
    Superuser {
        /// Username to create or update.
        username: String,
        /// New password, read from the `NEXUS_PASSWORD` environment
        /// variable when omitted.
        #[arg(long)]
        password: Option<String>,
        /// Revoke superuser rights instead of granting them.
        #[arg(long)]
        no_superuser: bool,
    },
    /// Render a sample pain.001 document to stdout, for checking a new
    /// connection's dialect/XML setup by eye before wiring it to the API.
    GenPain {
        /// `H004` or `H005`.
        #[arg(long, default_value = "H004")]
        dialect: String,
    },
    /// Parse a downloaded camt.052/053/054 file and print the extracted
    /// entries as JSON.
    ParseCamt {
        /// Path to the camt XML file.
        file: PathBuf,
        /// Which camt level `file` contains.
        #[arg(long, value_enum, default_value_t = CamtLevelArg::Statement)]
        level: CamtLevelArg,
    },
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CamtLevelArg {
    Report,
    Statement,
    Notification,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let cli = Cli::parse();
    match cli.command {
        Command::Serve { port, localhost_only, ipv4_only, unix_socket } => {
            serve(port, localhost_only, ipv4_only, unix_socket).await
        }
        Command::ResetTables => reset_tables().await,
        Command::Superuser { username, password, no_superuser } => {
            create_superuser(&username, password, !no_superuser).await
        }
        Command::GenPain { dialect } => gen_pain(&dialect),
        Command::ParseCamt { file, level } => parse_camt(&file, level),
    }
}

async fn build_state(config: &Config) -> anyhow::Result<AppState> {
    let db = Database::new(&config.database.url, config.database.max_connections).await?;
    db.migrate().await?;
    let transport = EbicsTransport::new()?;
    Ok(AppState {
        db,
        transport,
        clock: Arc::new(SystemClock),
        facade_bus: Arc::new(NoopFacadeBus),
        notifiers: AccountNotifiers::default(),
    })
}

async fn serve(
    port: Option<u16>,
    localhost_only: bool,
    ipv4_only: bool,
    unix_socket: Option<PathBuf>,
) -> anyhow::Result<()> {
    let mut config = Config::from_env().context("loading configuration")?;
    if let Some(port) = port {
        config.server.port = port;
    }
    if localhost_only {
        config.server.host = "127.0.0.1".to_string();
    } else if ipv4_only {
        config.server.host = "0.0.0.0".to_string();
    }
    config.validate().map_err(anyhow::Error::msg)?;

    let state = build_state(&config).await?;

    if let (Some(superuser), Ok(password)) = (&config.server.superuser, std::env::var("NEXUS_PASSWORD")) {
        auth::upsert_user(state.db.pool(), superuser, &password, true).await.context("seeding initial superuser")?;
    }

    let scheduler = Arc::new(Scheduler::new(state.db.clone(), Arc::new(ServiceTaskHandler::new(state.clone()))));
    tokio::spawn(scheduler.start());

    let app = routes::router().with_state(state);

    if let Some(socket_path) = unix_socket {
        let _ = std::fs::remove_file(&socket_path);
        let listener = tokio::net::UnixListener::bind(&socket_path)
            .with_context(|| format!("binding unix socket {}", socket_path.display()))?;
        tracing::info!(path = %socket_path.display(), "nexus listening on unix socket");
        axum::serve(listener, app).await?;
    } else {
        let addr = format!("{}:{}", config.server.host, config.server.port);
        let listener = tokio::net::TcpListener::bind(&addr).await.with_context(|| format!("binding {addr}"))?;
        tracing::info!(%addr, "nexus listening");
        axum::serve(listener, app).await?;
    }

    Ok(())
}

async fn reset_tables() -> anyhow::Result<()> {
    let config = Config::from_env().context("loading configuration")?;
    let db = Database::new(&config.database.url, config.database.max_connections).await?;
    db.migrate().await?;
    db.reset_tables().await?;
    tracing::info!("tables reset");
    Ok(())
}

async fn create_superuser(username: &str, password: Option<String>, superuser: bool) -> anyhow::Result<()> {
    let password = password
        .or_else(|| std::env::var("NEXUS_PASSWORD").ok())
        .ok_or_else(|| anyhow::anyhow!("pass --password or set NEXUS_PASSWORD"))?;

    let config = Config::from_env().context("loading configuration")?;
    let db = Database::new(&config.database.url, config.database.max_connections).await?;
    db.migrate().await?;
    auth::upsert_user(db.pool(), username, &password, superuser).await?;
    tracing::info!(username, superuser, "user upserted");
    Ok(())
}

fn gen_pain(dialect: &str) -> anyhow::Result<()> {
    use nexus_iso20022::dialect::Dialect;
    use nexus_iso20022::pain001::{self, Party, PaymentInitiationData};

    let dialect = if dialect.eq_ignore_ascii_case("H005") { Dialect::H005 } else { Dialect::H004 };
    let data = PaymentInitiationData {
        bank_account_id: uuid::Uuid::new_v4(),
        debtor: Party { iban: "DE89370400440532013000".to_string(), bic: Some("COBADEFFXXX".to_string()), name: "Example Debtor".to_string() },
        creditor: Party { iban: "DE02500105170137075030".to_string(), bic: Some("INGDDEFFXXX".to_string()), name: "Example Creditor".to_string() },
        amount: rust_decimal::Decimal::new(1000, 2),
        currency: "EUR".to_string(),
        subject: "sample transfer".to_string(),
        requested_execution_date: chrono::Utc::now().date_naive(),
        pain_counter: 1,
        prepared_at: chrono::Utc::now(),
    };
    let xml = pain001::build(dialect, &data)?;
    println!("{xml}");
    Ok(())
}

fn parse_camt(file: &PathBuf, level: CamtLevelArg) -> anyhow::Result<()> {
    use nexus_iso20022::camt::{self, FetchLevel};

    let xml = std::fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
    let level = match level {
        CamtLevelArg::Report => FetchLevel::Report,
        CamtLevelArg::Statement => FetchLevel::Statement,
        CamtLevelArg::Notification => FetchLevel::Notification,
    };
    let parsed = camt::parse(level, &xml)?;
    println!("{}", serde_json::to_string_pretty(&parsed)?);
    Ok(())
}
