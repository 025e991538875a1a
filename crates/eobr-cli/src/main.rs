use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "eobr")]
#[command(about = "EOBR billing reconciliation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile every configured input record and print the run summary.
    Run {
        /// Layered config paths in merge order. Defaults apply when omitted.
        #[arg(long = "config")]
        config_paths: Vec<String>,
    },

    /// Payment ledger administration
    Ledger {
        /// Layered config paths (only `ledger.url` is read)
        #[arg(long = "config", global = true)]
        config_paths: Vec<String>,

        #[command(subcommand)]
        cmd: LedgerCmd,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> site -> local...)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Audit trail utilities
    Audit {
        #[command(subcommand)]
        cmd: AuditCmd,
    },
}

#[derive(Subcommand)]
enum LedgerCmd {
    /// Connectivity and table presence
    Status,

    /// Print ledger rows, most recently updated first.
    List {
        #[arg(long)]
        order_id: Option<String>,

        #[arg(long, default_value_t = 10)]
        limit: i64,
    },

    /// Null out payment fields for the given keys so they are billed again.
    Reset {
        /// `<line_item_id>:<order_id>`, repeatable
        #[arg(long = "key", required = true)]
        keys: Vec<String>,

        /// Acknowledge that the listed line items will be paid again on the next run.
        #[arg(long, default_value_t = false)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum AuditCmd {
    /// Check the hash chain of an `audit.jsonl` file.
    Verify {
        #[arg(long)]
        path: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Silent if the file does not exist; deployments inject env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Run { config_paths } => commands::run::run(config_paths).await?,

        Commands::Ledger { config_paths, cmd } => {
            let url = commands::load_pipeline_config(&config_paths)?.1.ledger_url();
            match cmd {
                LedgerCmd::Status => commands::ledger::status(&url).await?,
                LedgerCmd::List { order_id, limit } => {
                    commands::ledger::list(&url, order_id.as_deref(), limit).await?
                }
                LedgerCmd::Reset { keys, yes } => commands::ledger::reset(&url, &keys, yes).await?,
            }
        }

        Commands::ConfigHash { paths } => {
            let loaded = eobr_config::load_layered_yaml(&paths)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Audit { cmd } => match cmd {
            AuditCmd::Verify { path } => commands::audit_verify(&path)?,
        },
    }

    Ok(())
}

/// Logs go to stderr so stdout stays `key=value` only.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}
