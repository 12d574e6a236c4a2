use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;
use std::{env, fs};
use threadwatch::app::{App, Command};
use threadwatch::config::Config;
use threadwatch::utils::{get_config_dir, initialize_panic_handler};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
/// Follow imageboard threads as they grow.
struct Args {
    /// Path to the configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Base URL of the board API.
    #[arg(long)]
    api_url: Option<String>,
    /// URL of the server-sent event stream.
    #[arg(long)]
    sse_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

impl Args {
    fn config_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.config {
            Ok(path.clone())
        } else {
            Self::default_config_path()
        }
    }
    fn default_config_path() -> Result<PathBuf> {
        let config_dir = get_config_dir()?;
        fs::create_dir_all(&config_dir)?;
        Ok(config_dir.join("threadwatch.config.toml"))
    }
}

fn init_logger() {
    let mut builder = env_logger::Builder::from_default_env();
    if env::var("RUST_LOG").is_err() {
        builder.filter_level(log::LevelFilter::Off);
    }
    builder.init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config_path = args.config_path()?;
    let mut config = if config_path.exists() {
        toml::from_str(&fs::read_to_string(&config_path)?)?
    } else {
        Config::default()
    };
    if let Some(api_url) = args.api_url {
        config.api.base_url = api_url;
    }
    if let Some(sse_url) = args.sse_url {
        config.sse.url = sse_url;
    }

    init_logger();

    initialize_panic_handler()?;

    App::new(config).run(args.command).await
}
