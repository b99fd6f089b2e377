use anyhow::Result;
use callbook::{app::AppStateBuilder, config::Config, version};
use clap::{Parser, Subcommand};
use std::fs::File;
use tracing::{error, info, level_filters::LevelFilter};

#[derive(Parser, Debug)]
#[command(
    version = version::get_short_version(),
    about = "Answers inbound calls, tries a human, then books the appointment itself",
    long_about = version::get_version_info()
)]
struct Cli {
    /// Path to the configuration file
    #[clap(long, global = true, default_value = "callbook.toml")]
    conf: String,
    #[clap(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate configuration and exit without starting the server
    CheckConfig,
}

fn load_config(path: &str) -> Result<Config> {
    let config = if std::path::Path::new(path).exists() {
        Config::load(path)?
    } else {
        Config::default()
    };
    Ok(config.apply_env())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.conf)?;

    let mut log_fmt = tracing_subscriber::fmt();
    if let Some(ref level) = config.log_level {
        if let Ok(lv) = level.as_str().parse::<LevelFilter>() {
            log_fmt = log_fmt.with_max_level(lv);
        }
    }
    let _guard = if let Some(ref log_file) = config.log_file {
        let file = File::create(log_file)?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        log_fmt.with_writer(non_blocking).try_init().ok();
        Some(guard)
    } else {
        log_fmt.try_init().ok();
        None
    };

    if let Err(e) = config.validate() {
        error!("invalid configuration in {}: {}", cli.conf, e);
        return Err(e);
    }
    if let Some(Commands::CheckConfig) = cli.command {
        info!("configuration {} is valid", cli.conf);
        return Ok(());
    }

    let state = AppStateBuilder::new().config(config).build().await?;
    info!(
        "Starting callbook {} on {}",
        version::get_short_version(),
        state.config.http_addr
    );

    let token = state.token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received CTRL+C, shutting down");
            token.cancel();
        }
    });
    callbook::app::run(state).await
}
