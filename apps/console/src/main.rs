use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use client_core::{config, Backend, SequenceEditor};
use shared::domain::Category;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::broadcast::error::RecvError,
};
use tracing::warn;
use tracing_subscriber::EnvFilter;

mod commands;
mod dispatch;

use commands::parse_intent;
use dispatch::{describe_event, render_sequence, Flow, Session};

#[derive(Parser, Debug)]
#[command(about = "Interactive venue sequence editor")]
struct Args {
    #[arg(long)]
    category: Option<String>,
    /// Use the Supabase backend regardless of settings.
    #[arg(long)]
    supabase: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let args = Args::parse();

    let mut settings = config::load_settings();
    if args.supabase {
        settings.backend = Backend::Supabase;
    }
    let category = match args.category {
        Some(raw) => Category::new(raw)?,
        None => settings.default_category()?,
    };

    let store = config::open_store(&settings).await?;
    let editor = Arc::new(SequenceEditor::new(store));

    let mut events = editor.subscribe();
    let notifier = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => println!("[{}]", describe_event(&event)),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "notifications dropped"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    if editor.load(&category).await.is_ok() {
        println!("{}", render_sequence(&category, &editor.sequence().await));
    }
    println!("type 'help' for commands");

    let mut session = Session::new(editor.clone(), category);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match parse_intent(&line) {
            Ok(intent) => {
                if session.dispatch(intent).await == Flow::Quit {
                    break;
                }
            }
            Err(message) => println!("{message}"),
        }
    }

    session.settle().await;
    editor.close();
    notifier.abort();
    Ok(())
}
