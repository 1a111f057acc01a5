use anyhow::Context;
use clap::{Parser, Subcommand};
use olxcat_client::config::{self, ClientConfig};
use olxcat_client::helpers::auth_store::{AuthStore, AuthUpdate};
use olxcat_client::helpers::recently_categorized::RecentlyCategorized;
use olxcat_client::helpers::session_store::{get_session_path, FileStore, KeyValueStore};
use olxcat_client::helpers::visibility::PageVisibility;
use olxcat_client::integrations::{HttpClient, ReqwestTransport};
use olxcat_client::services::{
    AdminService, CategoryService, EmailService, HealthService, ReportsService, SubscriptionService,
};
use olxcat_client::ChangeFeed;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::prelude::*;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(long)]
    log_file_path: Option<String>,

    /// Config file, instead of the one in the user config directory
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Follow the change feed, printing each change as a JSON line
    Watch,
    #[command(subcommand)]
    Emails(EmailsCommand),
    #[command(subcommand)]
    Categories(CategoriesCommand),
    /// Messages filed per category
    Usage {
        /// Count on the server instead of through the mailbox
        #[arg(long)]
        server: bool,
    },
    #[command(subcommand)]
    Subscriptions(SubscriptionsCommand),
    /// Exit non-zero unless the user may manage admin presets
    AdminAccess,
    Health,
    /// Print the config file location
    ConfigPath {
        /// Also print the effective settings (tokens redacted)
        #[arg(long)]
        show: bool,
    },
}

#[derive(Subcommand, Debug)]
enum EmailsCommand {
    List {
        #[arg(long)]
        top: Option<u32>,
        #[arg(long)]
        skip: Option<u32>,
    },
    Search {
        q: String,
        #[arg(long)]
        top: Option<u32>,
        #[arg(long)]
        skip: Option<u32>,
    },
    Move {
        id: String,
        category_id: String,
    },
}

#[derive(Subcommand, Debug)]
enum CategoriesCommand {
    List,
    Defaults,
}

#[derive(Subcommand, Debug)]
enum SubscriptionsCommand {
    List,
    Status,
    Delete { id: String },
    /// Renew the mailbox subscriptions ahead of expiry
    Rotate,
}

struct Client {
    http: HttpClient,
    store: Arc<dyn KeyValueStore>,
    config: ClientConfig,
}

impl Client {
    fn build(config: ClientConfig) -> anyhow::Result<Self> {
        let session_path = get_session_path();
        let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(&session_path));
        tracing::debug!("Session store at {:?}", session_path);

        let auth = AuthStore::new(store.clone());
        if config.auth.jwt.is_some() || config.auth.graph_token.is_some() {
            auth.set_all(AuthUpdate {
                jwt: config.auth.jwt.clone().map(Some),
                graph_token: config.auth.graph_token.clone().map(Some),
                user: None,
            });
        }

        let transport = ReqwestTransport::new(&config.api.base_url, config.request_timeout())
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http: HttpClient::new(Arc::new(transport), auth),
            store,
            config,
        })
    }
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn watch(client: Client) -> anyhow::Result<()> {
    if !client.http.auth().is_authenticated() {
        tracing::info!("No credentials yet; waiting for a login before polling");
    }

    let feed = ChangeFeed::new(
        client.http.clone(),
        client.store.clone(),
        PageVisibility::default(),
        client.config.change_feed_options(),
    );

    let recent = RecentlyCategorized::new();
    let _tracking = recent.follow(&feed);
    let subscription = feed.subscribe(|items| {
        for item in items {
            match serde_json::to_string(item) {
                Ok(line) => println!("{line}"),
                Err(e) => tracing::warn!("Failed to encode change item: {}", e),
            }
        }
    });

    tracing::info!("Watching for changes from version {}", feed.cursor());
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;

    tracing::info!("Ctrl+C received, stopping at version {}", feed.cursor());
    subscription.unsubscribe();
    Ok(())
}

async fn run(command: Command, config: ClientConfig, config_path: PathBuf) -> anyhow::Result<()> {
    if let Command::ConfigPath { show } = command {
        println!("{}", config_path.display());
        if show {
            let mut redacted = config;
            redacted.auth.jwt = redacted.auth.jwt.map(|_| "<set>".to_string());
            redacted.auth.graph_token = redacted.auth.graph_token.map(|_| "<set>".to_string());
            print!("{}", toml::to_string_pretty(&redacted)?);
        }
        return Ok(());
    }

    let client = Client::build(config)?;

    match command {
        Command::Watch => watch(client).await?,
        Command::Emails(EmailsCommand::List { top, skip }) => {
            let emails = EmailService::new(client.http)
                .list(top, skip)
                .await
                .context("Failed to list emails")?;
            print_json(&emails[..])?;
        }
        Command::Emails(EmailsCommand::Search { q, top, skip }) => {
            let emails = EmailService::new(client.http)
                .search(&q, top, skip)
                .await
                .context("Failed to search emails")?;
            print_json(&emails[..])?;
        }
        Command::Emails(EmailsCommand::Move { id, category_id }) => {
            let result = EmailService::new(client.http)
                .move_to_category(&id, &category_id)
                .await
                .with_context(|| format!("Failed to move email {id}"))?;
            print_json(&result)?;
        }
        Command::Categories(CategoriesCommand::List) => {
            let categories = CategoryService::new(client.http)
                .list()
                .await
                .context("Failed to list categories")?;
            let categories: Vec<shared_types::Category> =
                categories.into_iter().map(Into::into).collect();
            print_json(&categories)?;
        }
        Command::Categories(CategoriesCommand::Defaults) => {
            let categories = CategoryService::new(client.http)
                .defaults()
                .await
                .context("Failed to load default categories")?;
            print_json(&categories)?;
        }
        Command::Usage { server } => {
            let reports = ReportsService::new(client.http);
            let rows = if server {
                reports.category_usage_server().await
            } else {
                reports.category_usage().await
            }
            .context("Failed to load category usage")?;
            print_json(&rows)?;
        }
        Command::Subscriptions(SubscriptionsCommand::List) => {
            let subscriptions = SubscriptionService::new(client.http)
                .list()
                .await
                .context("Failed to list subscriptions")?;
            print_json(&subscriptions)?;
        }
        Command::Subscriptions(SubscriptionsCommand::Status) => {
            let status = SubscriptionService::new(client.http)
                .status()
                .await
                .context("Failed to load subscription status")?;
            print_json(&status)?;
        }
        Command::Subscriptions(SubscriptionsCommand::Delete { id }) => {
            let result = SubscriptionService::new(client.http)
                .delete(&id)
                .await
                .with_context(|| format!("Failed to delete subscription {id}"))?;
            print_json(&result)?;
        }
        Command::Subscriptions(SubscriptionsCommand::Rotate) => {
            let result = SubscriptionService::new(client.http)
                .rotate()
                .await
                .context("Failed to rotate subscriptions")?;
            print_json(&result)?;
        }
        Command::AdminAccess => {
            if !AdminService::new(client.http).check_access().await {
                anyhow::bail!("No admin access");
            }
            println!("ok");
        }
        Command::Health => {
            let status = HealthService::new(client.http)
                .status()
                .await
                .context("Health check failed")?;
            print_json(&status)?;
        }
        Command::ConfigPath { .. } => {}
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    if let Some(log_path) = args.log_file_path {
        let log_path = std::path::Path::new(&log_path);
        let file_appender = tracing_appender::rolling::never(
            log_path.parent().unwrap_or(std::path::Path::new(".")),
            log_path
                .file_name()
                .unwrap_or(std::ffi::OsStr::new("olxcat.log")),
        );
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        std::mem::forget(guard);

        tracing_subscriber::registry()
            .with(env_filter.clone())
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(true)
                    .with_writer(std::io::stderr),
            )
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(non_blocking),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    }

    let (config, config_path) = match args.config {
        Some(path) => (
            ClientConfig::load_from(&path).context("Failed to load config")?,
            path,
        ),
        None => ClientConfig::load().context("Failed to load config")?,
    };
    tracing::debug!("Config loaded from {:?}", config_path);
    if config_path != config::get_config_path() {
        tracing::info!("Using config file {:?}", config_path);
    }

    run(args.command, config, config_path).await
}
