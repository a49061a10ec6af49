//! stackwright: command-line client for the scaffold service.
//!
//!   stackwright bundle --idea ... --stack ... --feature "Title: description"
//!   stackwright stream --idea ... --stack ... --feature "Title: description"
//!   stackwright ask --bundle bundle.json "How do I add a route?"
//!
//! Progress goes to stderr, results to stdout.

mod client;
mod input;

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use stackwright_core::progress::ProgressTracker;
use stackwright_core::stage::Stage;

use crate::client::ServerClient;
use crate::input::ProjectArgs;

const TICK: Duration = Duration::from_millis(250);
const BAR_WIDTH: usize = 30;

#[derive(Parser)]
#[command(name = "stackwright", about = "Generate project scaffolds from a short description")]
struct Args {
    /// Base URL of the stackwright server
    #[arg(long, env = "STACKWRIGHT_SERVER", default_value = "http://127.0.0.1:3000", global = true)]
    server: String,

    /// Typical generation time, used to pace the progress bar
    #[arg(long, default_value_t = 20, global = true)]
    expected_secs: u64,

    /// Hide the progress bar
    #[arg(long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate the full seven-part bundle and print it as JSON
    Bundle {
        #[command(flatten)]
        project: ProjectArgs,
        /// Write the bundle to this file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Stream a complete implementation to stdout as it is generated
    Stream {
        #[command(flatten)]
        project: ProjectArgs,
    },
    /// Ask a question about a saved bundle
    Ask {
        /// Bundle file written by `stackwright bundle --output`
        #[arg(long)]
        bundle: PathBuf,
        question: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stackwright=warn".into()),
        )
        .init();

    let args = Args::parse();
    let client = ServerClient::new(&args.server);
    let progress = Progress::new(Duration::from_secs(args.expected_secs), args.quiet);

    match args.command {
        Command::Bundle { project, output } => run_bundle(&client, &project, output, progress).await,
        Command::Stream { project } => run_stream(&client, &project, progress).await,
        Command::Ask { bundle, question } => run_ask(&client, &bundle, &question).await,
    }
}

async fn run_bundle(
    client: &ServerClient,
    project: &ProjectArgs,
    output: Option<PathBuf>,
    mut progress: Progress,
) -> Result<()> {
    let request = project.to_request();
    request.validate()?;
    tracing::debug!(features = project.features.len(), "Requesting bundle");

    let call = client.bundle(&request);
    tokio::pin!(call);
    let mut ticker = tokio::time::interval(TICK);
    let result = loop {
        tokio::select! {
            result = &mut call => break result,
            _ = ticker.tick() => progress.tick(),
        }
    };
    let bundle = match result {
        Ok(bundle) => {
            progress.finish();
            bundle
        }
        Err(e) => {
            progress.clear();
            return Err(e);
        }
    };

    let json = serde_json::to_string_pretty(&bundle)?;
    match output {
        Some(path) => {
            std::fs::write(&path, json + "\n")
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!(
                "Wrote {} ({} files)",
                path.display(),
                bundle.main_project_files.len()
            );
        }
        None => println!("{json}"),
    }
    Ok(())
}

async fn run_stream(client: &ServerClient, project: &ProjectArgs, mut progress: Progress) -> Result<()> {
    let request = project.to_request();
    request.validate()?;

    let mut fragments = client.stream(&request).await?;
    let mut stdout = std::io::stdout().lock();
    let mut ticker = tokio::time::interval(TICK);
    loop {
        tokio::select! {
            next = fragments.next() => match next {
                Some(Ok(bytes)) => {
                    progress.clear();
                    stdout.write_all(&bytes)?;
                    stdout.flush()?;
                }
                Some(Err(e)) => {
                    progress.clear();
                    return Err(e);
                }
                None => break,
            },
            _ = ticker.tick() => progress.tick(),
        }
    }
    writeln!(stdout)?;
    progress.finish();
    Ok(())
}

async fn run_ask(client: &ServerClient, bundle: &std::path::Path, question: &str) -> Result<()> {
    let context = client::read_bundle(bundle)?;
    let answer = client.ask(question, &context).await?;
    println!("{}", answer.answer);
    Ok(())
}

// ── Progress bar ───────────────────────────────────────────────────────

struct Progress {
    tracker: ProgressTracker,
    quiet: bool,
    drawn: bool,
}

impl Progress {
    fn new(expected: Duration, quiet: bool) -> Self {
        Self {
            tracker: ProgressTracker::new(expected),
            quiet,
            drawn: false,
        }
    }

    fn tick(&mut self) {
        self.tracker.tick();
        self.draw();
    }

    fn finish(&mut self) {
        self.tracker.complete();
        self.draw();
        if self.drawn {
            eprintln!();
            self.drawn = false;
        }
    }

    /// Erase the bar so other output starts on a clean line.
    fn clear(&mut self) {
        if self.drawn {
            eprint!("\r{:width$}\r", "", width = BAR_WIDTH + 24);
            self.drawn = false;
        }
    }

    fn draw(&mut self) {
        if self.quiet {
            return;
        }
        let total = Stage::ALL.len() as u8;
        eprint!(
            "\r{}",
            render_bar(self.tracker.percent(), self.tracker.step(total), total)
        );
        let _ = std::io::stderr().flush();
        self.drawn = true;
    }
}

fn render_bar(percent: u8, step: u8, total: u8) -> String {
    let filled = usize::from(percent.min(100)) * BAR_WIDTH / 100;
    format!(
        "[{}{}] {percent:>3}%  step {step} of {total}",
        "#".repeat(filled),
        "-".repeat(BAR_WIDTH - filled)
    )
}
