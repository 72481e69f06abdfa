// Command-line front end: list clips for a filter and fetch one for playback

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use time::{OffsetDateTime, PrimitiveDateTime};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use factory_video_client::browser::{
    FilterCriteria, Topology, Update, VideoBrowserController, ALL_DEVICES, DEFAULT_SEARCH_DAYS,
};
use factory_video_client::{ClientConfig, HttpVideoClient};

#[derive(Debug, Parser)]
#[command(name = "factory-video", version, about = "Browse and fetch factory error-log video clips")]
struct Cli {
    #[command(flatten)]
    network: NetworkArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct NetworkArgs {
    /// Video server base URL (overrides FACTORY_VIDEO_SERVER)
    #[arg(long, global = true)]
    server: Option<String>,

    /// SOCKS5/HTTP proxy URL
    #[arg(long, global = true)]
    proxy: Option<String>,

    /// Request timeout in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Where downloaded clips are stored
    #[arg(long, global = true)]
    download_dir: Option<PathBuf>,
}

impl NetworkArgs {
    fn apply(self, mut config: ClientConfig) -> ClientConfig {
        if let Some(server) = self.server {
            config = config.with_server_url(server);
        }
        if self.proxy.is_some() {
            config = config.with_proxy(self.proxy);
        }
        if let Some(timeout) = self.timeout {
            config = config.with_timeout(timeout);
        }
        if let Some(dir) = self.download_dir {
            config = config.with_download_dir(dir);
        }
        config
    }
}

#[derive(Debug, Args)]
struct FilterArgs {
    /// Device id, or "All Devices"
    #[arg(long, default_value = ALL_DEVICES)]
    device: String,

    /// Error log id (optional)
    #[arg(long, default_value = "")]
    error_id: String,

    /// Window start, "YYYY-MM-DD hh:mm" (default: 7 days ago)
    #[arg(long)]
    from: Option<String>,

    /// Window end, "YYYY-MM-DD hh:mm" (default: now)
    #[arg(long)]
    to: Option<String>,

    /// Maximum number of results
    #[arg(long)]
    limit: Option<u32>,
}

impl FilterArgs {
    fn criteria(&self, config: &ClientConfig) -> anyhow::Result<FilterCriteria> {
        let now = OffsetDateTime::now_utc().to_offset(config.utc_offset);
        let now = PrimitiveDateTime::new(now.date(), now.time());
        let defaults = FilterCriteria::last_days(now, DEFAULT_SEARCH_DAYS);

        let start = match &self.from {
            Some(s) => FilterCriteria::parse_time(s)?,
            None => defaults.start_time,
        };
        let end = match &self.to {
            Some(s) => FilterCriteria::parse_time(s)?,
            None => defaults.end_time,
        };

        Ok(FilterCriteria::new(start, end)
            .with_device(self.device.as_str())
            .with_error_log_id(self.error_id.as_str())
            .with_max_results(self.limit.unwrap_or(config.max_results))
            .with_utc_offset(config.utc_offset))
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List configured devices
    Devices,
    /// List clips matching a filter
    Query {
        #[command(flatten)]
        filter: FilterArgs,
        /// Print records as JSON
        #[arg(long)]
        json: bool,
    },
    /// Download one clip from the result list and open it
    Fetch {
        #[command(flatten)]
        filter: FilterArgs,
        /// Row of the result list to fetch
        #[arg(long, default_value_t = 0)]
        index: usize,
    },
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "factory_video_client=info,factory_video=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let Cli { network, command } = Cli::parse();
    // The local UTC offset is only readable before the runtime starts its workers
    let config = network.apply(ClientConfig::from_env()?);

    tokio::runtime::Runtime::new()
        .context("Failed to start async runtime")?
        .block_on(run(command, config))
}

async fn run(command: Command, config: ClientConfig) -> anyhow::Result<()> {
    if let Command::Devices = command {
        println!("{}", ALL_DEVICES);
        for device in &config.devices {
            println!("{}", device);
        }
        return Ok(());
    }

    let client = HttpVideoClient::new(config.clone()).context("Failed to create video client")?;
    let mut browser = VideoBrowserController::with_http(Arc::new(client), Topology::MultiWindow);

    match command {
        Command::Devices => Ok(()),
        Command::Query { filter, json } => {
            run_query(&mut browser, &filter.criteria(&config)?).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(browser.results())?);
            } else {
                for (i, video) in browser.results().iter().enumerate() {
                    println!("{:>3}  {}", i, video.list_label());
                }
                eprintln!("{}", browser.status());
            }
            Ok(())
        }
        Command::Fetch { filter, index } => {
            run_query(&mut browser, &filter.criteria(&config)?).await?;
            run_fetch(&mut browser, index).await
        }
    }
}

async fn run_query(
    browser: &mut VideoBrowserController,
    criteria: &FilterCriteria,
) -> anyhow::Result<()> {
    browser.refresh(criteria)?;
    while browser.has_pending_work() {
        if let Some(Update::QueryFailed { reason, .. }) = browser.pump().await {
            bail!(reason);
        }
    }
    Ok(())
}

async fn run_fetch(browser: &mut VideoBrowserController, index: usize) -> anyhow::Result<()> {
    if !browser.select_video(index).can_play {
        bail!(
            "No video at index {} ({} results)",
            index,
            browser.results().len()
        );
    }
    browser.open_selected()?;

    while browser.has_pending_work() {
        match browser.pump().await {
            Some(Update::DownloadProgress { percent, status, .. }) => {
                eprintln!("{:>5.1}%  {}", percent, status);
            }
            Some(Update::SessionOpened { session, .. }) => {
                if let Some(player) = browser.session(session) {
                    if let Some(path) = player.local_path() {
                        println!("{}", path.display());
                    }
                    eprintln!("{}  {}", player.transport_label(), player.time_label());
                }
                eprintln!("{}", browser.status());
                browser.close_session(session)?;
            }
            Some(Update::DownloadFailed { reason, .. })
            | Some(Update::SessionFailed { reason, .. }) => {
                bail!("{}: {}", browser.status(), reason);
            }
            _ => {}
        }
    }
    Ok(())
}
