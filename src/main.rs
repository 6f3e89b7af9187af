// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Awards Night command-line client.
//!
//! Signs in through the identity provider's implicit grant, keeps the
//! session in a local file, and sends likes and predictions to Firestore.

use anyhow::Context;
use awards_night::{
    build_session_manager,
    config::Config,
    db::FirestoreDb,
    host::Navigator,
    models::{Pick, PredictionBallot},
    services::{DebouncedAggregator, FlushOutcome},
    storage::FileStorage,
};
use clap::{Parser, Subcommand};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

#[derive(Parser)]
#[command(name = "awards-night", version, about = "Awards night voting client")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the sign-in URL to open in a browser
    Login,
    /// Finish sign-in from the URL the browser was sent back to
    Callback {
        /// Full URL including the `#access_token=...` fragment
        url: String,
    },
    /// Show the current session
    Status,
    /// Forget the session
    Logout,
    /// Like a nominee one or more times
    Like {
        target: String,
        #[arg(long, default_value_t = 1)]
        times: u32,
    },
    /// Submit predictions as `category=nominee` pairs
    Predict {
        #[arg(required = true)]
        picks: Vec<Pick>,
    },
}

/// Navigator for a terminal: "navigating" prints the URL for the user.
struct TerminalNavigator {
    current: Mutex<Url>,
}

impl TerminalNavigator {
    fn new(url: Url) -> Self {
        Self {
            current: Mutex::new(url),
        }
    }
}

impl Navigator for TerminalNavigator {
    fn current_url(&self) -> Url {
        self.current
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn replace_url(&self, url: &Url) {
        tracing::debug!(url = %url, "Location replaced");
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = url.clone();
    }

    fn navigate(&self, url: &Url) {
        println!("Open this URL in your browser to sign in:\n\n  {url}\n");
        println!("Then run `awards-night callback '<url you were sent back to>'`.");
    }

    fn reload(&self) {
        println!("Signed out.");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let cli = Cli::parse();
    let config = Config::from_env().context("Failed to load configuration")?;

    let start_url = match &cli.command {
        Command::Callback { url } => url.as_str(),
        _ => config.app_origin.as_str(),
    };
    let start_url = Url::parse(start_url).with_context(|| format!("Invalid URL {start_url}"))?;

    let storage = Arc::new(FileStorage::new(&config.session_storage_path));
    let navigator = Arc::new(TerminalNavigator::new(start_url));
    let session = build_session_manager(&config, storage, navigator);

    match cli.command {
        Command::Login => {
            session.restore();
            session.login()?;
        }
        Command::Callback { .. } => match session.startup()? {
            Some(profile_fetch) => {
                profile_fetch.await.context("Profile fetch task failed")?;
                print_status(&session);
            }
            None => println!("That URL does not carry a sign-in response."),
        },
        Command::Status => {
            session.restore();
            print_status(&session);
        }
        Command::Logout => {
            session.restore();
            session.logout();
        }
        Command::Like { target, times } => {
            session.restore();
            anyhow::ensure!(session.is_authenticated(), "Not signed in; run `login` first");

            let db = FirestoreDb::new(&config.gcp_project_id).await?;
            let baseline = match db.get_like_tally(&target).await {
                Ok(tally) => tally.map(|t| t.count).unwrap_or(0),
                Err(e) => {
                    tracing::warn!(error = %e, "Could not read current tally");
                    0
                }
            };

            let likes = DebouncedAggregator::new(&target, Arc::new(db), config.like_debounce)
                .with_baseline(baseline);
            for _ in 0..times {
                let total = likes.record();
                println!("{target}: {total}");
                tokio::time::sleep(Duration::from_millis(25)).await;
            }

            match likes.close().await {
                FlushOutcome::Delivered(n) => println!("Saved {n} like(s)."),
                FlushOutcome::Dropped(n) => println!("Could not save {n} like(s)."),
                FlushOutcome::Idle => {}
            }
        }
        Command::Predict { picks } => {
            session.restore();
            let profile = session
                .profile()
                .context("Not signed in (or profile unavailable); run `login` first")?;

            let db = FirestoreDb::new(&config.gcp_project_id).await?;
            let ballot = PredictionBallot::new(profile.id, picks);
            match db.submit_prediction(&ballot).await {
                Ok(()) => println!("Predictions saved ({} picks).", ballot.picks.len()),
                Err(e) if e.is_retryable() => {
                    anyhow::bail!("Could not save predictions, please try again: {e}")
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    Ok(())
}

fn print_status(session: &awards_night::services::SessionManager) {
    match session.profile() {
        Some(profile) => println!(
            "Signed in as {} <{}>",
            profile.display_name, profile.email
        ),
        None if session.is_authenticated() => println!("Signed in; profile not available yet."),
        None => println!("Not signed in."),
    }
}

/// Initialize logging on stderr: compact by default, JSON with `LOG_FORMAT=json`.
fn init_logging() {
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let json_layer = json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_current_span(true)
            .flatten_event(true)
    });
    let compact_layer = (!json).then(|| {
        tracing_subscriber::fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(false)
    });

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("awards_night=debug,warn")),
        )
        .with(json_layer)
        .with(compact_layer)
        .init();
}
