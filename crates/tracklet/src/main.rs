//! tracklet binary entry point

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context as _, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::{json, Map, Value};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tracklet_client::{Action, Delivery, Page, Resolution, Session};
use tracklet_config::Settings;
use tracklet_storage::{FileLocalStore, InMemoryCookieJar};

/// How long `send` waits for a queued item to be processed
const QUEUE_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser, Debug)]
#[command(name = "tracklet")]
#[command(about = "Send analytics events and resolve cross-domain visitor ids")]
struct Args {
    /// Path to a YAML settings file
    #[arg(short, long, env = "TRACKLET_CONFIG")]
    config: Option<PathBuf>,

    /// Write key; required without a config file
    #[arg(long, env = "TRACKLET_API_KEY")]
    api_key: Option<String>,

    /// Collection host, e.g. api.segment.io/v1
    #[arg(long, env = "TRACKLET_API_HOST")]
    api_host: Option<String>,

    /// Peer domain for cross-domain lookups (repeatable)
    #[arg(long = "peer", env = "TRACKLET_PEERS", value_delimiter = ',')]
    peers: Vec<String>,

    /// URL of the page the events are attributed to
    #[arg(long, env = "TRACKLET_PAGE_URL", default_value = "file:///tracklet/index.html")]
    page_url: String,

    /// Agent string reported in `context.userAgent`
    #[arg(long, env = "TRACKLET_USER_AGENT")]
    user_agent: Option<String>,

    /// File holding persisted visitor state
    #[arg(long, env = "TRACKLET_STATE", default_value = "tracklet-state.json")]
    state: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Deliver one call
    Send {
        kind: Kind,

        /// Call payload as a JSON object
        #[arg(short, long, default_value = "{}")]
        payload: String,
    },
    /// Resolve the cross-domain id against the configured peers
    Resolve,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Kind {
    Page,
    Identify,
    Group,
    Track,
    Alias,
}

impl Kind {
    fn as_str(self) -> &'static str {
        match self {
            Kind::Page => "page",
            Kind::Identify => "identify",
            Kind::Group => "group",
            Kind::Track => "track",
            Kind::Alias => "alias",
        }
    }
}

fn settings(args: &Args) -> Result<Settings> {
    let mut settings = match (&args.config, &args.api_key) {
        (Some(path), _) => Settings::load(path)
            .with_context(|| format!("failed to load settings from {}", path.display()))?,
        (None, Some(api_key)) => Settings::new(api_key.clone()),
        (None, None) => bail!("either --config or --api-key is required"),
    };
    if let (Some(_), Some(api_key)) = (&args.config, &args.api_key) {
        settings.api_key = api_key.clone();
    }
    if let Some(api_host) = &args.api_host {
        settings.api_host = api_host.clone();
    }
    if !args.peers.is_empty() {
        settings.cross_domain_id_servers = args.peers.clone();
    }
    settings.validate()?;
    Ok(settings)
}

fn resolution_json(resolution: &Resolution) -> Value {
    json!({
        "crossDomainId": resolution.cross_domain_id,
        "fromDomain": resolution.from_domain,
        "timestamp": resolution.resolved_at.timestamp_millis(),
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let settings = settings(&args)?;

    let user_agent = args
        .user_agent
        .clone()
        .unwrap_or_else(|| format!("tracklet/{}", env!("CARGO_PKG_VERSION")));
    let page = Page::parse(&args.page_url, user_agent)
        .with_context(|| format!("invalid page url {}", args.page_url))?;
    // Cookies live for the process only; persisted state needs a file: page
    let cookies = Arc::new(InMemoryCookieJar::new(page.host()));
    let local = Arc::new(
        FileLocalStore::open(&args.state)
            .with_context(|| format!("failed to open state file {}", args.state.display()))?,
    );

    info!(
        api_host = %settings.api_host,
        page = %page.url,
        peers = settings.cross_domain_id_servers.len(),
        "starting tracklet"
    );
    let session = Arc::new(Session::builder(settings, page, cookies, local).build()?);

    match args.command {
        Command::Resolve => {
            let resolution = match session.initialize().await {
                Some(handle) => handle.await??,
                None => session.retrieve_cross_domain_id().await?,
            };
            println!("{}", resolution_json(&resolution));
        }
        Command::Send { kind, payload } => {
            let payload: Map<String, Value> = serde_json::from_str(&payload)
                .context("payload must be a JSON object")?;
            let Some(action) = Action::from_kind(kind.as_str(), payload) else {
                bail!("unsupported call {}", kind.as_str());
            };
            let path = action.path();

            let processed = session.subscribe_processed();
            if let Some(handle) = session.initialize().await {
                match handle.await? {
                    Ok(resolution) => info!(resolution = %resolution_json(&resolution), "cross-domain id resolved"),
                    Err(e) => warn!(error = %e, "cross-domain id unavailable"),
                }
            }

            match session.handle(action).await? {
                Delivery::Sent(resp) => {
                    println!("{}", json!({"status": resp.status, "url": resp.url, "body": resp.body}));
                }
                Delivery::Beacon => println!("{}", json!({"delivery": "beacon"})),
                Delivery::Queued => {
                    let Some(mut events) = processed else {
                        bail!("message queued without a queue to watch");
                    };
                    // The cross-domain identify may be processed before this call
                    loop {
                        let event = tokio::time::timeout(QUEUE_DRAIN_TIMEOUT, events.recv())
                            .await
                            .context("timed out waiting for queued delivery")??;
                        match &event.result {
                            Ok(resp) => info!(url = %event.item.url, status = resp.status, "queued item delivered"),
                            Err(e) => error!(url = %event.item.url, error = %e, "queued item failed"),
                        }
                        if event.item.url.ends_with(path) {
                            println!(
                                "{}",
                                json!({"delivery": "queue", "attempts": event.attempts, "ok": event.result.is_ok()})
                            );
                            break;
                        }
                    }
                }
            }
        }
    }

    session.shutdown().await;
    Ok(())
}
