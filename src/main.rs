use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use notifyhome::api::{self, AppState};
use notifyhome::calendar::{fetch_all, CredentialStore};
use notifyhome::cast::{CastV2Transport, DeviceDirectory, MdnsBrowser};
use notifyhome::config::{self, DeviceTarget, ScheduleConfig, ServerConfig};
use notifyhome::daemon::{self, Scheduler};
use notifyhome::locale::Locale;
use notifyhome::notify::Notifier;
use notifyhome::quiet::QuietWindow;

#[derive(Parser)]
#[command(name = "notifyhome")]
#[command(about = "Speak upcoming calendar events and ad-hoc messages on Google Home speakers")]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the calendar scheduler and the HTTP listener
    #[command(alias = "d")]
    Daemon {
        #[command(flatten)]
        target: TargetArgs,

        /// Port for the HTTP listener
        #[arg(short, long, default_value_t = 8000)]
        port: u16,

        /// Interval between calendar passes
        #[arg(short, long, default_value = "30m", value_parser = humantime::parse_duration)]
        notify_duration: Duration,

        /// Only announce events starting within this window (0 for no bound)
        #[arg(short, long, default_value = "2h", value_parser = humantime::parse_duration)]
        within: Duration,

        /// Events fetched per account and pass
        #[arg(long, default_value_t = 1)]
        count: u32,

        /// Directory holding credentials.json and tokens.json
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Manage calendar accounts
    #[command(alias = "c")]
    Calendar {
        #[command(subcommand)]
        command: CalendarCommands,
    },
    /// Speak one message on the targeted speakers and exit
    Notify {
        #[command(flatten)]
        target: TargetArgs,

        #[arg(short, long, default_value = "Hello, world!!")]
        message: String,
    },
    /// Run only the HTTP listener
    Server {
        #[command(flatten)]
        target: TargetArgs,

        #[arg(short, long, default_value_t = 8000)]
        port: u16,
    },
}

#[derive(Subcommand)]
enum CalendarCommands {
    /// Authorize one more Google account
    #[command(alias = "a")]
    AddToken {
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Print upcoming events of every account
    #[command(alias = "f")]
    FetchPlan {
        #[arg(long)]
        path: Option<PathBuf>,

        #[arg(short, long, default_value = "14d", value_parser = humantime::parse_duration)]
        within: Duration,

        #[arg(long, default_value_t = 10)]
        count: u32,
    },
}

#[derive(Args, Clone)]
struct TargetArgs {
    /// Friendly name of the speaker to use (every speaker when omitted)
    #[arg(long)]
    device_name: Option<String>,

    /// Maximum number of speakers to address
    #[arg(long, default_value_t = 4)]
    device_count: usize,

    /// Language of spoken text (en or ja); `server` defaults to ja, the rest to en
    #[arg(short, long, value_parser = parse_locale)]
    locale: Option<Locale>,

    /// How long to listen for speakers on the network
    #[arg(long, default_value = "15s", value_parser = humantime::parse_duration)]
    discovery_timeout: Duration,

    /// Gap between consecutive messages on one speaker
    #[arg(long, default_value = "10s", value_parser = humantime::parse_duration)]
    pacing: Duration,
}

impl TargetArgs {
    fn locale_or(&self, default: Locale) -> Locale {
        self.locale.unwrap_or(default)
    }

    fn target(&self) -> DeviceTarget {
        DeviceTarget::new(self.device_count, self.device_name.clone())
    }

    fn notifier(&self, shutdown: CancellationToken) -> Arc<Notifier> {
        let directory = DeviceDirectory::new(Arc::new(MdnsBrowser::default()), self.discovery_timeout);
        let notifier = Notifier::new(
            directory,
            Arc::new(CastV2Transport::default()),
            QuietWindow::new(),
        )
        .with_pacing(self.pacing)
        .with_shutdown(shutdown);
        Arc::new(notifier)
    }
}

fn parse_locale(code: &str) -> Result<Locale, std::convert::Infallible> {
    Ok(Locale::from_code(code))
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "notifyhome=debug,tower_http=debug"
    } else {
        "notifyhome=info,tower_http=info"
    };
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| default.into()),
    );

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli.command).await {
        tracing::error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Daemon {
            target,
            port,
            notify_duration,
            within,
            count,
            path,
        } => {
            let store = CredentialStore::new(config::credentials_dir(path));
            let accounts = store
                .accounts(reqwest::Client::new())
                .context("load calendar accounts")?;
            tracing::info!("{} calendar account(s) registered", accounts.len());

            let shutdown = CancellationToken::new();
            daemon::cancel_on_signal(shutdown.clone());

            let notifier = target.notifier(shutdown.clone());
            let schedule = ScheduleConfig {
                tick: notify_duration,
                within: config::horizon(within),
                per_account: count,
                locale: target.locale_or(Locale::En),
                target: target.target(),
            };
            let server = ServerConfig {
                port,
                locale: target.locale_or(Locale::En),
                target: target.target(),
                ..ServerConfig::default()
            };

            let app = AppState::new(notifier.clone(), &server);
            let scheduler = Arc::new(Scheduler::new(notifier, accounts, schedule));
            daemon::run_daemon(scheduler, app, &server, shutdown).await
        }
        Commands::Calendar { command } => match command {
            CalendarCommands::AddToken { path } => add_token(path).await,
            CalendarCommands::FetchPlan {
                path,
                within,
                count,
            } => fetch_plan(path, within, count).await,
        },
        Commands::Notify { target, message } => {
            let shutdown = CancellationToken::new();
            daemon::cancel_on_signal(shutdown.clone());

            let notifier = target.notifier(shutdown);
            let report = notifier
                .notify(&target.target(), target.locale_or(Locale::En), &[message])
                .await?;
            tracing::info!(
                "{:?}: {} device(s) reached",
                report.outcome,
                report.succeeded_devices()
            );
            Ok(())
        }
        Commands::Server { target, port } => {
            let shutdown = CancellationToken::new();
            daemon::cancel_on_signal(shutdown.clone());

            let server = server_config(&target, port);
            let app = AppState::new(target.notifier(shutdown.clone()), &server);
            api::serve(app, server.listen_addr(), server.grace, shutdown).await
        }
    }
}

/// The standalone listener speaks Japanese unless told otherwise.
fn server_config(target: &TargetArgs, port: u16) -> ServerConfig {
    ServerConfig {
        port,
        locale: target.locale_or(Locale::Ja),
        target: target.target(),
        ..ServerConfig::default()
    }
}

async fn add_token(path: Option<PathBuf>) -> anyhow::Result<()> {
    let store = CredentialStore::new(config::credentials_dir(path));
    let oauth = store.load_client()?;
    let url = oauth.authorize_url()?;
    println!(
        "Go to the following link in your browser then type the authorization code:\n{}",
        url
    );

    let mut code = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut code)
        .await
        .context("read authorization code")?;
    let code = code.trim();
    if code.is_empty() {
        bail!("no authorization code given");
    }

    let token = oauth.exchange_code(&reqwest::Client::new(), code).await?;
    let count = store.append_token(token)?;
    tracing::info!("Token saved, {} account(s) registered", count);
    Ok(())
}

async fn fetch_plan(path: Option<PathBuf>, within: Duration, count: u32) -> anyhow::Result<()> {
    let store = CredentialStore::new(config::credentials_dir(path));
    let accounts = store
        .accounts(reqwest::Client::new())
        .context("load calendar accounts")?;

    let aggregated = fetch_all(&accounts, count, config::horizon(within)).await;
    if aggregated.event_count() == 0 {
        println!("No upcoming events");
    }
    for account in &aggregated.accounts {
        for event in &account.events {
            println!(
                "{}: {} {}",
                account.label,
                event.start.format("%Y/%m/%d %H:%M"),
                event.title
            );
        }
    }

    if let Some(failure) = aggregated.first_error() {
        bail!("{}: {}", failure.label, failure.error);
    }
    Ok(())
}
