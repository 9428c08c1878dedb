use anyhow::{Context, Result};
use clap::Parser;
use parley_server::api;
use parley_server::config::ServerConfig;
use std::path::PathBuf;

/// Parley: reminders, saved information and a mock tracker behind MCP JSON-RPC.
///
/// Clients POST to /mcp (or /mcp/message, /message) and follow /sse for
/// change notifications.
#[derive(Parser, Debug)]
#[command(name = "parley", version)]
struct Args {
    /// TOML settings file; missing file means built-in defaults
    #[arg(short, long, env = "PARLEY_CONFIG", default_value = "parley.toml")]
    config: PathBuf,

    /// Where reminders.json and information.json live
    #[arg(short, long, env = "PARLEY_DATA_DIR", default_value = "./data")]
    data_dir: PathBuf,

    #[arg(short, long, env = "PARLEY_PORT", default_value_t = 8080)]
    port: u16,

    #[arg(long, env = "PARLEY_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Print the effective settings as TOML and exit
    #[arg(long)]
    print_config: bool,
}

impl Args {
    fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "parley=info,parley_server=info,tower_http=info".into()),
        )
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .init();
}

async fn run(args: Args) -> Result<()> {
    let addr = args.listen_addr();

    if args.config.exists() {
        tracing::info!(path = %args.config.display(), "Using settings file");
    }

    let config = ServerConfig::load(&args.config, args.data_dir.clone())?;

    if args.print_config {
        print!("{}", toml::to_string_pretty(&config).context("Failed to render settings")?);
        return Ok(());
    }

    let data_dir = config
        .data_dir
        .canonicalize()
        .unwrap_or_else(|_| config.data_dir.clone());
    tracing::info!(
        data_dir = %data_dir.display(),
        reminders = %config.reminders_path().display(),
        information = %config.information_path().display(),
        "Storage ready"
    );
    tracing::info!(
        "Due-reminder reports: run `parley-reminder-agent --server-url http://{}`",
        addr
    );

    api::serve(&addr, config).await
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let args = Args::parse();
    tracing::info!("parley {}", env!("CARGO_PKG_VERSION"));

    run(args).await
}
