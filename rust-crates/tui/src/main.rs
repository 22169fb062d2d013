use clap::Parser;
use color_eyre::eyre::{
    Result,
    eyre,
};
use std::{
    path::PathBuf,
    time::Duration,
};

mod client;
mod demo;
mod ui;

const DEFAULT_LOG_DIR: &str = "~/.fireball-drop/logs";
const DEFAULT_APP_ORIGIN: &str = "https://fireball-drop.app";

#[derive(Parser, Debug)]
#[command(version, about = "Terminal viewer for FireBall drops", long_about = None)]
struct Args {
    /// Drop shown at start
    #[arg(long = "drop", default_value_t = 0)]
    drop_id: u64,

    /// Seed for the simulated contract and the board physics
    #[arg(long)]
    seed: Option<u64>,

    /// Number of simulated drops created at start
    #[arg(long, default_value_t = 6)]
    demo_drops: u32,

    /// View drops as their host, which enables manual winner selection
    #[arg(long, default_value = "false")]
    as_host: bool,

    #[arg(long)]
    neynar_url: Option<String>,

    #[arg(long, env = "NEYNAR_API_KEY", hide_env_values = true)]
    neynar_api_key: Option<String>,

    /// Relay endpoint that receives drop notifications
    #[arg(long)]
    notify_url: Option<String>,

    #[arg(long, default_value = DEFAULT_APP_ORIGIN)]
    app_origin: String,

    #[arg(long, default_value = DEFAULT_LOG_DIR)]
    log_dir: String,

    #[arg(long, default_value_t = 60)]
    fps: u32,
}

fn app_config(args: Args) -> Result<client::AppConfig> {
    if args.fps == 0 || args.fps > 240 {
        return Err(eyre!("--fps must be between 1 and 240, got {}", args.fps));
    }
    let neynar = match (args.neynar_api_key, args.neynar_url) {
        (Some(api_key), url) => Some(client::NeynarConfig {
            url: url.unwrap_or_else(|| drops::neynar::DEFAULT_NEYNAR_URL.to_string()),
            api_key,
        }),
        (None, Some(_)) => {
            return Err(eyre!("--neynar-url needs an API key (--neynar-api-key or NEYNAR_API_KEY)"));
        }
        (None, None) => None,
    };
    Ok(client::AppConfig {
        drop_id: args.drop_id,
        seed: args.seed,
        demo_drops: args.demo_drops,
        as_host: args.as_host,
        neynar,
        notify_url: args.notify_url,
        app_origin: args.app_origin,
        frame_interval: Duration::from_secs_f64(1.0 / f64::from(args.fps)),
    })
}

fn log_dir(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).into_owned())
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();
    let _log_guard = client::init_tracing(&log_dir(&args.log_dir))?;
    tracing::info!("starting fireball-drop");
    let config = app_config(args)?;
    client::run_app(config).await
}
