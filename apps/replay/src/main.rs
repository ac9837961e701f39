use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use anyhow::{Context, Result};
use clap::Parser;
use client_core::{BasicMaterializer, BroadcastSink, CommandProcessor, ScrollAction, ViewEvent};
use futures::{future, Stream, StreamExt};
use shared::protocol::Command;
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, BufReader},
    sync::broadcast,
    task::JoinSet,
};
use tokio_stream::wrappers::LinesStream;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod config;

use config::load_settings;

const VIEW_EVENT_CAPACITY: usize = 256;

/// Replay a JSON-lines log of server output commands against a fresh scope tree.
#[derive(Parser, Debug)]
struct Args {
    /// Command log to replay; reads stdin when omitted.
    #[arg(long)]
    input: Option<PathBuf>,
    #[arg(long, default_value = "replay.toml")]
    config: PathBuf,
    /// Print the final scope tree as JSON on stdout.
    #[arg(long)]
    print_tree: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let settings = load_settings(&args.config)?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let sink = Arc::new(BroadcastSink::new(VIEW_EVENT_CAPACITY));
    let animator = tokio::spawn(animate(sink.subscribe()));

    let mut processor = CommandProcessor::with_config(
        settings.processor_config(),
        Arc::new(BasicMaterializer),
        sink.clone(),
        sink.clone(),
    );

    let reader: Box<dyn AsyncRead + Unpin + Send> = match &args.input {
        Some(path) => Box::new(
            tokio::fs::File::open(path)
                .await
                .with_context(|| format!("failed to open command log '{}'", path.display()))?,
        ),
        None => Box::new(tokio::io::stdin()),
    };
    let rejected = Arc::new(AtomicUsize::new(0));
    let summary = processor
        .run(decode_lines(reader, Arc::clone(&rejected)))
        .await;

    if args.print_tree {
        println!(
            "{}",
            serde_json::to_string_pretty(&processor.store().snapshot())?
        );
    }

    // The animator stops once every sender is gone.
    drop(processor);
    drop(sink);
    animator.await.context("view event task panicked")?;

    info!(
        commands = summary.commands,
        failed_fields = summary.failed_fields,
        rejected = rejected.load(Ordering::Relaxed),
        "replay: finished"
    );
    Ok(())
}

fn decode_lines<R>(reader: R, rejected: Arc<AtomicUsize>) -> impl Stream<Item = Command> + Unpin
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let lines = LinesStream::new(BufReader::new(reader).lines())
        .inspect(|line| {
            if let Err(err) = line {
                error!(%err, "replay: failed to read command log");
            }
        })
        .take_while(|line| future::ready(line.is_ok()))
        .filter_map(|line| future::ready(line.ok()))
        .enumerate()
        .filter_map(move |(index, line)| {
            let outcome = if line.trim().is_empty() {
                None
            } else {
                match Command::from_json(&line) {
                    Ok(command) => Some(command),
                    Err(err) => {
                        warn!(line = index + 1, %err, "replay: rejected command");
                        rejected.fetch_add(1, Ordering::Relaxed);
                        None
                    }
                }
            };
            future::ready(outcome)
        });
    Box::pin(lines)
}

/// Stand-in for the page: applies view events without ever holding up the
/// processor. Scrolls honour their settle delay on their own task.
async fn animate(mut events: broadcast::Receiver<ViewEvent>) {
    let mut pending = JoinSet::new();
    loop {
        match events.recv().await {
            Ok(ViewEvent::Scroll(action)) => {
                pending.spawn(scroll(action));
            }
            Ok(ViewEvent::TitleChanged(title)) => info!(%title, "page: title changed"),
            Ok(ViewEvent::FixedHeightChanged(enabled)) => {
                info!(enabled, "page: output layout switched")
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "page: view events dropped")
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
    while pending.join_next().await.is_some() {}
}

async fn scroll(action: ScrollAction) {
    let request = action.request();
    if !request.delay.is_zero() {
        tokio::time::sleep(request.delay).await;
    }
    let surface = match &action {
        ScrollAction::Container(_) => "output box",
        ScrollAction::Document(_) => "document",
    };
    info!(
        surface,
        target = ?request.target,
        position = ?request.position,
        padding = request.padding,
        "page: scrolled"
    );
}
