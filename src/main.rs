use argh::FromArgs;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use issuecheck::config::HarnessConfig;
use issuecheck::fixtures::{load_dataset, prepare_test_env, seed};
use issuecheck::store::Store;
use issuecheck::suite::{self, Outcome};
use issuecheck::{AppState, HarnessError, HarnessResult, create_app};

#[derive(FromArgs, Debug)]
/// issuecheck: HTML assertions for server-rendered issue pages.
struct Args {
    #[argh(subcommand)]
    command: Command,
}

#[derive(FromArgs, Debug)]
#[argh(subcommand)]
enum Command {
    Serve(ServeArgs),
    Check(CheckArgs),
    List(ListArgs),
    Seed(SeedArgs),
}

#[derive(FromArgs, Debug)]
/// Serve the reference issue tracker over the fixture data.
#[argh(subcommand, name = "serve")]
struct ServeArgs {
    /// host to bind to
    #[argh(option, default = "String::from(\"127.0.0.1\")")]
    host: String,

    /// port to listen on (0 for random available port)
    #[argh(option, short = 'p', default = "0")]
    port: u16,

    /// directory of JSON fixtures (defaults to the embedded set)
    #[argh(option)]
    fixtures: Option<PathBuf>,

    /// existing SQLite store to serve instead of the fixtures
    #[argh(option)]
    db: Option<PathBuf>,

    /// issues per list page
    #[argh(option)]
    page_size: Option<usize>,

    /// open the browser automatically
    #[argh(switch, short = 'o')]
    open: bool,
}

#[derive(FromArgs, Debug)]
/// Run scenarios and report the results.
#[argh(subcommand, name = "check")]
struct CheckArgs {
    /// base URL of a running server; scenarios run in-process when omitted
    #[argh(option)]
    base_url: Option<String>,

    /// directory of JSON fixtures (defaults to the embedded set)
    #[argh(option)]
    fixtures: Option<PathBuf>,

    /// existing SQLite store to read expectations from
    #[argh(option)]
    db: Option<PathBuf>,

    /// issues per list page
    #[argh(option)]
    page_size: Option<usize>,

    /// scenario names to run (all when omitted)
    #[argh(positional)]
    scenarios: Vec<String>,
}

#[derive(FromArgs, Debug)]
/// Write the fixture data to an SQLite file usable with --db.
#[argh(subcommand, name = "seed")]
struct SeedArgs {
    /// path of the SQLite file to create or overwrite
    #[argh(option)]
    db: PathBuf,

    /// directory of JSON fixtures (defaults to the embedded set)
    #[argh(option)]
    fixtures: Option<PathBuf>,
}

#[derive(FromArgs, Debug)]
/// List the built-in scenarios.
#[argh(subcommand, name = "list")]
struct ListArgs {}

/// Flags win over `ISSUECHECK_*` environment variables.
fn build_config(
    base_url: Option<String>,
    fixtures: Option<PathBuf>,
    db: Option<PathBuf>,
    page_size: Option<usize>,
) -> HarnessResult<HarnessConfig> {
    let mut config = HarnessConfig::from_env()?;
    if base_url.is_some() {
        config.base_url = base_url;
    }
    if fixtures.is_some() {
        config.fixtures_dir = fixtures;
    }
    if db.is_some() {
        config.db_path = db;
    }
    if let Some(page_size) = page_size {
        if page_size == 0 {
            return Err(HarnessError::Config("--page-size must be positive".into()));
        }
        config.page_size = page_size;
    }
    Ok(config)
}

async fn serve(args: ServeArgs) -> HarnessResult<()> {
    let config = build_config(None, args.fixtures, args.db, args.page_size)?;
    let store = prepare_test_env(&config)?;
    let state = AppState::new(store).with_page_size(config.page_size);
    let app = create_app(Arc::new(state));

    let addr_str = format!("{}:{}", args.host, args.port);
    let addr: SocketAddr = addr_str
        .parse()
        .map_err(|_| HarnessError::Config(format!("invalid host or port: {}", addr_str)))?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;
    let url = format!("http://{}", actual_addr);

    tracing::info!("{}", url);

    if args.open && let Err(e) = open::that(&url) {
        tracing::error!("Failed to open browser: {}", e);
    }

    axum::serve(listener, app).await?;
    Ok(())
}

fn seed_file(args: SeedArgs) -> HarnessResult<()> {
    let config = build_config(None, args.fixtures, None, None)?;
    let dataset = load_dataset(&config)?;
    let store = Store::open(&args.db)?;
    seed(&store, &dataset)?;
    tracing::info!("Seeded {}", args.db.display());
    Ok(())
}

async fn check(args: CheckArgs) -> HarnessResult<ExitCode> {
    let config = build_config(args.base_url, args.fixtures, args.db, args.page_size)?;
    let scenarios = suite::select(&args.scenarios)?;

    let outcomes = suite::run_all(&config, &scenarios).await;

    let mut failed = 0;
    let mut aborted = 0;
    for outcome in &outcomes {
        match outcome {
            Outcome::Completed(report) => {
                if !report.passed() {
                    failed += 1;
                }
                println!("{}", report);
            }
            Outcome::Aborted { name, error } => {
                aborted += 1;
                println!("{} ... ERROR\n    {}", name, error);
            }
        }
    }
    println!(
        "\n{} passed, {} failed, {} errored",
        outcomes.len() - failed - aborted,
        failed,
        aborted
    );

    Ok(if aborted > 0 {
        ExitCode::from(2)
    } else if failed > 0 {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    })
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "issuecheck=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Args = argh::from_env();

    let result = match args.command {
        Command::Serve(serve_args) => serve(serve_args).await.map(|()| ExitCode::SUCCESS),
        Command::Check(check_args) => check(check_args).await,
        Command::Seed(seed_args) => seed_file(seed_args).map(|()| ExitCode::SUCCESS),
        Command::List(_) => {
            for scenario in suite::issue_scenarios() {
                println!("{:<32} {}", scenario.name, scenario.description);
            }
            Ok(ExitCode::SUCCESS)
        }
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::from(2)
        }
    }
}
