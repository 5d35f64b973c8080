//! Youneeq page runtime CLI
//!
//! Runs the recommendation and search handlers against a saved HTML page.
//! Provides:
//! - `scan`: show each container's configuration without touching the network
//! - `run`: send first requests and print the rendered containers
//! - `search` and `session`: call the search and session endpoints directly

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures_util::FutureExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use yq_client::{ApiClient, ClientError, Transport, TransportFuture};
use yq_core::args::Args;
use yq_core::config::{Directories, Settings};
use yq_core::document::{ContainerKind, Document, Element};
use yq_core::host::Host;
use yq_core::recommend::Feature;
use yq_core::{
    Discovery, IdentityPayload, Page, PageUpdate, PanelClick, RecommendRequest, RecommendResponse,
    RequestVariant, SearchQuery, SearchResponse, SearchType, Tag, Tags,
};

/// Youneeq page runtime CLI
#[derive(Parser)]
#[command(name = "yq")]
#[command(about = "Youneeq page runtime - recommendation and search containers")]
#[command(version)]
#[command(after_help = "\
Examples:
  yq scan page.html --url https://news.example.com/story   Show container configuration
  yq run page.html --url https://news.example.com/story    Request and render every container
  yq search \"maple syrup\" --domain news.example.com        Run a text search
  yq search harbour --domain news.example.com --image      Run an image search
  yq session                                               Fetch a new visitor session id
")]
struct Cli {
    /// Settings file (defaults to ~/.config/youneeq/settings.json)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Also write logs to this file
    #[arg(long, global = true, value_name = "PATH")]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the containers of a saved page and the request each would send
    Scan {
        /// Saved HTML page
        file: PathBuf,

        /// URL the page was served from
        #[arg(long)]
        url: String,
    },

    /// Discover containers, send first requests and print rendered markup
    Run {
        /// Saved HTML page
        file: PathBuf,

        /// URL the page was served from
        #[arg(long)]
        url: String,

        /// Visitor session id for search requests
        #[arg(long)]
        session: Option<String>,

        /// Stop waiting for responses after this many seconds
        #[arg(long, default_value_t = 15)]
        timeout: u64,
    },

    /// Run a search against the search service
    Search {
        /// Search text
        text: String,

        /// Site domain to search
        #[arg(long)]
        domain: String,

        /// Search images instead of articles
        #[arg(long)]
        image: bool,

        /// Result page
        #[arg(long, default_value_t = 1)]
        page: u64,
    },

    /// Fetch a new visitor session id
    Session,
}

/// Set up logging to stderr, and to `log_file` when given.
/// Debug builds default to debug level, release builds to info.
fn setup_logging(log_file: Option<&Path>) -> Option<WorkerGuard> {
    let level = if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("yq_cli={level},yq_core={level},yq_client={level}"))
    });

    fn stderr_layer<S>()
    -> fmt::Layer<S, fmt::format::DefaultFields, fmt::format::Format, fn() -> std::io::Stderr> {
        fmt::layer()
            .with_writer(std::io::stderr as fn() -> std::io::Stderr)
            .with_target(true)
    }

    let Some(path) = log_file else {
        tracing_subscriber::registry()
            .with(stderr_layer())
            .with(filter)
            .init();
        return None;
    };

    let dir = path
        .parent()
        .filter(|d| !d.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let name = path
        .file_name()
        .map_or_else(|| "yq.log".into(), ToOwned::to_owned);
    let (non_blocking, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer())
        .with(filter)
        .init();

    eprintln!("Logging to: {} (and stderr)", path.display());
    Some(guard)
}

fn load_settings(path: Option<PathBuf>) -> Result<Settings> {
    let path = match path {
        Some(path) => path,
        None => Directories::new()?.settings_file,
    };
    debug!("Loading settings from {}", path.display());
    Settings::load(&path).with_context(|| format!("Failed to load {}", path.display()))
}

fn read_page(file: &Path, url: &str) -> Result<Document> {
    let html = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    Document::parse(&html, url).with_context(|| format!("Failed to parse page for {url}"))
}

/// Transport for dry runs. Every call fails without touching the network.
struct OfflineTransport;

impl OfflineTransport {
    fn refuse<T: Send + 'static>() -> TransportFuture<T> {
        async { Err(ClientError::status(503, "offline:dry-run")) }.boxed()
    }
}

impl Transport for OfflineTransport {
    fn recommend(
        &self,
        _request: RecommendRequest,
        _variant: RequestVariant,
    ) -> TransportFuture<RecommendResponse> {
        Self::refuse()
    }

    fn identify(&self, _payload: IdentityPayload) -> TransportFuture<()> {
        Self::refuse()
    }

    fn search(
        &self,
        _search_type: SearchType,
        _query: SearchQuery,
    ) -> TransportFuture<SearchResponse> {
        Self::refuse()
    }

    fn session_id(&self) -> TransportFuture<String> {
        Self::refuse()
    }

    fn fetch_story(&self, _post_id: String) -> TransportFuture<String> {
        Self::refuse()
    }

    fn panel_click(&self, _click: PanelClick) -> TransportFuture<()> {
        Self::refuse()
    }
}

async fn scan(settings: Settings, file: &Path, url: &str) -> Result<()> {
    let document = read_page(file, url)?;
    let (mut page, _updates) =
        Page::new(document, settings, Host::new(), Arc::new(OfflineTransport));
    page.generate_with(Discovery::Manual).await?;

    for kind in [ContainerKind::Recommend, ContainerKind::Search] {
        let mut elements: Vec<Element> = page.document().containers(kind).cloned().collect();
        elements.sort_by_key(Element::priority);
        for element in elements {
            match kind {
                ContainerKind::Recommend => page.add_recommend(element, Args::new())?,
                ContainerKind::Search => page.add_search(element)?,
            };
        }
    }

    if page.registry().is_empty() {
        println!("No containers found");
        return Ok(());
    }

    let first = Tags::from([Tag::First, Tag::Observe]);
    for handler in page.registry().recommend_handlers() {
        let element = handler.container().element();
        println!(
            "recommend#{} <{}> priority {}",
            handler.id_num(),
            element.tag,
            element.priority()
        );
        if element.opts_out() {
            println!("  yq-no-auto: no automatic request");
        }
        if !handler.features().is_empty() {
            let names: Vec<&str> = handler.features().iter().map(Feature::as_str).collect();
            println!("  features: {}", names.join(", "));
        }
        println!(
            "{}",
            serde_json::to_string_pretty(&handler.build_request(&first))?
        );
    }

    for handler in page.registry().search_handlers() {
        println!(
            "search#{} {:?}, {} per page",
            handler.id_num(),
            handler.search_type(),
            handler.search_type().per_page()
        );
        if let Some(form) = handler.form_id() {
            println!("  form: #{form}");
        }
        println!("{}", serde_json::to_string_pretty(handler.query())?);
    }
    Ok(())
}

fn report(update: &PageUpdate) {
    match update {
        PageUpdate::PopulateAttach {
            instance, response, ..
        } => println!("{instance}: {} stories", response.stories().count()),
        PageUpdate::SearchPopulateAttach {
            instance, response, ..
        } => println!("{instance}: {} results", response.num_results.unwrap_or(0)),
        PageUpdate::StoryAttached { instance, .. } => println!("{instance}: story attached"),
        PageUpdate::RequestFailed { instance, error } => {
            println!("{instance}: request failed: {error}");
        }
        PageUpdate::PopulatePrepare { .. }
        | PageUpdate::SearchPopulatePrepare { .. }
        | PageUpdate::ScrollBottom { .. } => {}
    }
}

async fn run(
    settings: Settings,
    file: &Path,
    url: &str,
    session: Option<String>,
    timeout: Duration,
) -> Result<()> {
    let document = read_page(file, url)?;
    let client = ApiClient::new(settings.api.endpoints.clone())?;

    let mut host = Host::new();
    if let Some(id) = session {
        host = host.with_global_session(id);
    }

    let (mut page, mut updates) = Page::new(document, settings, host, Arc::new(client));
    let ids = page.generate().await?;
    info!("Started {} handlers", ids.len());

    if tokio::time::timeout(timeout, page.run_until_idle())
        .await
        .is_err()
    {
        warn!(
            "Stopped waiting after {}s with {} requests in flight",
            timeout.as_secs(),
            page.in_flight()
        );
    }

    while let Ok(update) = updates.try_recv() {
        report(&update);
    }

    for handler in page.registry().recommend_handlers() {
        println!("\n== recommend#{} ==", handler.id_num());
        println!("{}", handler.container().markup());
    }
    for handler in page.registry().search_handlers() {
        println!(
            "\n== search#{} ({} results) ==",
            handler.id_num(),
            handler.results_count()
        );
        println!("{}", handler.container().markup());
    }
    Ok(())
}

async fn search(
    settings: &Settings,
    text: String,
    domain: String,
    image: bool,
    page: u64,
) -> Result<()> {
    let client = ApiClient::new(settings.api.endpoints.clone())?;
    let search_type = if image {
        SearchType::Image
    } else {
        SearchType::Article
    };
    let query = SearchQuery {
        search: Some(text),
        domain: Some(domain),
        page_number: Some(page),
        order_by: Some("relevance".to_string()),
        ..Default::default()
    };

    let response = client
        .send_search(search_type, &query)
        .await
        .context("Search request failed")?;
    let total = response.num_results.unwrap_or(0);
    println!(
        "{total} results, page {page} of {}",
        total.div_ceil(search_type.per_page())
    );
    for item in response.items() {
        println!("{}\n  {}", item.title, item.url);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = setup_logging(cli.log_file.as_deref());
    let settings = load_settings(cli.config)?;

    match cli.command {
        Commands::Scan { file, url } => scan(settings, &file, &url).await,
        Commands::Run {
            file,
            url,
            session,
            timeout,
        } => run(settings, &file, &url, session, Duration::from_secs(timeout)).await,
        Commands::Search {
            text,
            domain,
            image,
            page,
        } => search(&settings, text, domain, image, page).await,
        Commands::Session => {
            let client = ApiClient::new(settings.api.endpoints)?;
            let id = client
                .fetch_session_id()
                .await
                .context("Session id request failed")?;
            println!("{id}");
            Ok(())
        }
    }
}
