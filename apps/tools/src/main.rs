use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{config, Backend, SequenceEditor};
use shared::domain::{Category, EntityId};
use storage::Storage;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Manage venues and their per-category display order")]
struct Cli {
    /// sqlite or supabase
    #[arg(long, value_parser = parse_backend)]
    backend: Option<Backend>,
    #[arg(long)]
    database_url: Option<String>,
    #[arg(long)]
    category: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List selectable entities.
    Entities,
    /// List categories that have a stored order (sqlite backend only).
    Categories,
    /// Add an entity (sqlite backend only).
    AddEntity { name: String },
    /// Rename an entity (sqlite backend only).
    RenameEntity { id: i64, name: String },
    /// Delete an entity (sqlite backend only). Sequences keep its id.
    DeleteEntity { id: i64 },
    /// Print the stored order for the category.
    Show,
    /// Replace the selection with the given ids, in order, and save.
    Set { ids: Vec<i64> },
    /// Move `source` into the slot held by `target` and save.
    Move { source: i64, target: i64 },
    /// Save an empty sequence for the category.
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let cli = Cli::parse();

    let mut settings = config::load_settings();
    if let Some(backend) = cli.backend {
        settings.backend = backend;
    }
    if let Some(url) = cli.database_url {
        settings.database_url = storage::normalize_database_url(&url);
    }
    let category = match cli.category {
        Some(raw) => Category::new(raw)?,
        None => settings.default_category()?,
    };

    match &cli.command {
        Command::Categories => {
            let storage = sqlite_only(&settings).await?;
            for category in storage.list_categories().await? {
                println!("{category}");
            }
            return Ok(());
        }
        Command::AddEntity { name } => {
            let storage = sqlite_only(&settings).await?;
            let id = storage.create_entity(name).await?;
            println!("created entity id={id}");
            return Ok(());
        }
        Command::RenameEntity { id, name } => {
            let storage = sqlite_only(&settings).await?;
            if !storage.rename_entity(EntityId(*id), name).await? {
                bail!("no entity with id={id}");
            }
            println!("renamed entity id={id}");
            return Ok(());
        }
        Command::DeleteEntity { id } => {
            let storage = sqlite_only(&settings).await?;
            if !storage.delete_entity(EntityId(*id)).await? {
                bail!("no entity with id={id}");
            }
            println!("deleted entity id={id}");
            return Ok(());
        }
        _ => {}
    }

    let store = config::open_store(&settings).await?;
    let editor = SequenceEditor::new(store);
    editor.load(&category).await?;

    match cli.command {
        Command::Entities => {
            for option in editor.options().await {
                println!("{:>6}  {}", option.value.0, option.label);
            }
        }
        Command::Show => print_sequence(&editor, &category).await,
        Command::Set { ids } => {
            let ids: Vec<EntityId> = ids.into_iter().map(EntityId).collect();
            editor.set_selection(&ids).await;
            editor.save(&category).await?;
            print_sequence(&editor, &category).await;
        }
        Command::Move { source, target } => {
            let before = editor.sequence().await;
            let after = editor.reorder(EntityId(source), EntityId(target)).await;
            if before == after {
                println!("nothing to move");
                return Ok(());
            }
            editor.save(&category).await?;
            print_sequence(&editor, &category).await;
        }
        Command::Clear => {
            editor.set_selection(&[]).await;
            editor.save(&category).await?;
            println!("cleared sequence for '{category}'");
        }
        Command::Categories
        | Command::AddEntity { .. }
        | Command::RenameEntity { .. }
        | Command::DeleteEntity { .. } => {}
    }

    Ok(())
}

fn parse_backend(raw: &str) -> Result<Backend, String> {
    raw.parse::<Backend>().map_err(|e| e.to_string())
}

async fn sqlite_only(settings: &config::Settings) -> Result<Storage> {
    if settings.backend != Backend::Sqlite {
        bail!("this command is only available on the sqlite backend");
    }
    Storage::new(&settings.database_url)
        .await
        .with_context(|| format!("failed to open {}", settings.database_url))
}

async fn print_sequence(editor: &SequenceEditor, category: &Category) {
    let sequence = editor.sequence().await;
    if sequence.is_empty() {
        println!("'{category}' has no sequenced entities");
        return;
    }
    println!("'{category}':");
    for entry in sequence.entries() {
        println!("{:>4}. {} (id={})", entry.position, entry.display_name, entry.id);
    }
}
