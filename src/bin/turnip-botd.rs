use clap::Parser;
use turnip_bot::config::Config;
use turnip_bot::daemon;
use turnip_bot::error::Result;

#[derive(Parser, Debug)]
#[command(name = "turnip-botd")]
#[command(about = "Turnip bot webhook daemon")]
struct Cli {
    #[arg(long, default_value_t = turnip_bot::runtime_paths::default_config_path())]
    config: String,

    #[arg(long)]
    host: Option<String>,

    #[arg(long)]
    port: Option<u16>,

    #[arg(long, default_value_t = turnip_bot::runtime_paths::default_db_path())]
    db: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    turnip_bot::logging::init_tracing("turnip_botd");
    let cli = Cli::parse();

    let mut config = Config::load_or_default(&cli.config, &cli.db)?;
    if let Some(host) = cli.host {
        config.daemon.host = host;
    }
    if let Some(port) = cli.port {
        config.daemon.port = port;
    }

    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("Shutdown requested");
    };
    daemon::run_with_shutdown(&config, shutdown).await
}
