//! `smartstore-import` -- structured-data import from the terminal.
//!
//! Uploads a JSON file to the Smart Storage backend for analysis, applies
//! the schema decisions given as flags, starts the import and follows the
//! job until it finishes.
//!
//! # Environment variables
//!
//! | Variable                  | Required | Default                      | Description                      |
//! |---------------------------|----------|------------------------------|----------------------------------|
//! | `SMARTSTORE_API_URL`      | no       | `http://localhost:8000`      | Backend base URL                 |
//! | `SMARTSTORE_SESSION_FILE` | no       | `~/.smartstore/session.json` | Where the login token is kept    |
//! | `POLLING_INTERVAL_MS`     | no       | `5000`                       | Delay between job status polls   |
//! | `MAX_FILE_SIZE_BYTES`     | no       | `52428800`                   | Largest accepted upload          |
//! | `ALLOWED_FILE_TYPES`      | no       | `.json`                      | Comma-separated extensions       |
//! | `REQUEST_TIMEOUT_SECS`    | no       | `60`                         | HTTP request timeout             |
//! | `LOG_FORMAT`              | no       | --                           | `json` for JSON log lines        |

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use smartstore_cli::decision_args::{apply_decision_args, DecisionArgs};
use smartstore_cli::render;
use smartstore_client::api::SmartStorageApi;
use smartstore_client::auth::Registration;
use smartstore_client::config::ClientConfig;
use smartstore_client::error::ImportError;
use smartstore_client::import::ImportSession;
use smartstore_client::monitor::{MonitorEvent, MonitorExit, MonitorHandle};
use smartstore_core::job::JobOutcome;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "smartstore-import", author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze a file, apply decisions and run the import.
    Import(ImportArgs),
    /// Log in and store the session token.
    Login(Credentials),
    /// Create an account.
    Register(Credentials),
    /// Forget the stored session.
    Logout,
    /// Show the status of an import job.
    Status {
        job_id: String,
        /// Keep polling until the job finishes.
        #[arg(long)]
        watch: bool,
    },
    /// List stored tables and collections.
    Entities,
}

#[derive(clap::Args, Debug)]
struct ImportArgs {
    /// JSON file to import.
    file: PathBuf,

    #[command(flatten)]
    decisions: DecisionArgs,

    /// Stop after analysis and print the request that would be sent.
    #[arg(long)]
    dry_run: bool,

    /// Print the rejected records when the job completes with errors.
    #[arg(long)]
    show_failed: bool,
}

#[derive(clap::Args, Debug)]
struct Credentials {
    #[arg(long, env = "SMARTSTORE_EMAIL")]
    email: String,
    #[arg(long, env = "SMARTSTORE_PASSWORD", hide_env_values = true)]
    password: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = ClientConfig::from_env().map_err(|e| anyhow!(e.user_message()))?;
    tracing::debug!(api_url = %config.api_url, "Starting smartstore-import");

    let api = Arc::new(SmartStorageApi::new(&config).context("failed to build HTTP client")?);

    match cli.command {
        Command::Import(args) => run_import(api, &config, args).await,
        Command::Login(creds) => {
            let profile = api
                .login(&creds.email, &creds.password)
                .await
                .map_err(|e| anyhow!(e.user_message()))?;
            println!("Logged in as {}", render::signed_in(&profile));
            Ok(())
        }
        Command::Register(creds) => {
            match api
                .register(&creds.email, &creds.password)
                .await
                .map_err(|e| anyhow!(e.user_message()))?
            {
                Registration::LoggedIn(profile) => {
                    println!("Registered and logged in as {}", render::signed_in(&profile))
                }
                Registration::LoginRequired => println!("Account created. Run `smartstore-import login` to continue."),
            }
            Ok(())
        }
        Command::Logout => {
            api.logout().await;
            println!("Logged out");
            Ok(())
        }
        Command::Status { job_id, watch } => run_status(api, &config, job_id, watch).await,
        Command::Entities => {
            let entities = api
                .list_entities()
                .await
                .map_err(|e| anyhow!(e.user_message()))?;
            print!("{}", render::entities(&entities));
            Ok(())
        }
    }
}

fn init_tracing() {
    let json = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "smartstore_cli=info,smartstore_client=info".into()),
        )
        .with(json.then(|| tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
        .init();
}

/// Cancelled on Ctrl-C.
fn ctrl_c_token() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });
    cancel
}

async fn run_import(
    api: Arc<SmartStorageApi>,
    config: &ClientConfig,
    args: ImportArgs,
) -> anyhow::Result<()> {
    if !api.is_authenticated().await {
        tracing::warn!("Not logged in; the backend may reject the upload");
    }

    let mut session = ImportSession::new(Arc::clone(&api), config.upload.clone());
    session.select_path(&args.file).map_err(user_error)?;
    if let Some(file) = session.workflow().state().file() {
        println!("{}", render::selected_file(file));
    }

    println!("Analyzing...");
    session.analyze().await.map_err(user_error)?;
    let model = session.decisions_mut().map_err(user_error)?;
    print!("{}", render::analysis_summary(model.analysis()));

    apply_decision_args(model, &args.decisions).map_err(|e| anyhow!(e.user_message()))?;
    print!("{}", render::decisions_summary(model));

    if args.dry_run {
        let request = model.build_request().map_err(|e| anyhow!(e.user_message()))?;
        println!("{}", serde_json::to_string_pretty(&request)?);
        return Ok(());
    }

    if !session.workflow().can_execute() {
        return Err(anyhow!(
            "High schema variance: pass --override --acknowledge-risks to import separate schemas, or --merged"
        ));
    }

    let job_id = session.execute().await.map_err(user_error)?;
    println!("Import job {job_id} started");

    let cancel = ctrl_c_token();
    let result = session
        .monitor(&cancel, |event, _| match event {
            MonitorEvent::Status(job) => println!("{}", render::progress_line(job)),
            MonitorEvent::PollError(message) => eprintln!("Warning: {message}"),
            MonitorEvent::Completed(_) => {}
        })
        .await;

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(ImportError::Cancelled { job_id }) => {
            println!(
                "Stopped following job {job_id}; it keeps running on the server. \
                 Check it with `smartstore-import status {job_id}`."
            );
            return Ok(());
        }
        Err(e) => return Err(user_error(e)),
    };

    print!("{}", render::outcome_summary(&outcome));

    if args.show_failed && matches!(outcome, JobOutcome::CompletedWithErrors(_)) {
        match session.failed_records().await {
            Ok(records) => print!("{}", render::failed_records(&records)),
            Err(e) => eprintln!("Could not load failed records: {}", e.user_message()),
        }
    }

    session.close().map_err(user_error)?;

    match outcome {
        JobOutcome::Failed { message } => Err(anyhow!("Upload failed: {message}")),
        _ => Ok(()),
    }
}

async fn run_status(
    api: Arc<SmartStorageApi>,
    config: &ClientConfig,
    job_id: String,
    watch: bool,
) -> anyhow::Result<()> {
    if !watch {
        let job = api
            .get_job_status(&job_id)
            .await
            .map_err(|e| anyhow!(e.user_message()))?;
        println!("{}", render::progress_line(&job));
        if let Some(outcome) = job.outcome() {
            print!("{}", render::outcome_summary(&outcome));
        }
        return Ok(());
    }

    let (handle, mut events) = MonitorHandle::spawn(api, job_id, config.upload.polling_interval);
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(MonitorEvent::Status(job)) => println!("{}", render::progress_line(&job)),
                Some(MonitorEvent::PollError(message)) => eprintln!("Warning: {message}"),
                Some(MonitorEvent::Completed(job)) => {
                    if let Some(outcome) = job.outcome() {
                        print!("{}", render::outcome_summary(&outcome));
                    }
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                handle.cancel();
                break;
            }
        }
    }

    if let MonitorExit::Cancelled = handle.join().await? {
        println!("Stopped watching; the job keeps running on the server.");
    }
    Ok(())
}

fn user_error(err: ImportError) -> anyhow::Error {
    anyhow!(err.user_message())
}
