use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use inventory_core::config::{
    concurrency_from_env_value, preview_width_from_env_value, storage_dir_from_env_value,
    transcoder_program_from_env_value,
};
use inventory_core::{
    AssetName, CoreConfig, InventoryService, ItemId, ItemPatch, RoomPatch, RoomPath,
    WriteOutcome,
};

#[derive(Parser)]
#[command(name = "inventory")]
#[command(about = "Inventory document store CLI")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Allocate new item ids
    Allocate {
        /// Number of ids to create
        count: u32,
    },
    /// List all items
    List,
    /// List distinct item places
    Places,
    /// List distinct #tags from item comments
    Tags,
    /// Show one item with its files and hardware summary
    Show { id: ItemId },
    /// Set item fields (key=value, values starting with [ or { are read as JSON)
    Set {
        id: ItemId,
        #[arg(required = true)]
        fields: Vec<String>,
        /// Start from an empty record instead of the current one
        #[arg(long)]
        replace: bool,
        /// Only write if the stored date still equals this value (implies --replace)
        #[arg(long)]
        expected_date: Option<String>,
    },
    /// List archived versions of an item or room document
    History {
        owner: String,
        /// Treat the owner as a room path
        #[arg(long)]
        room: bool,
    },
    /// List items placed in a room
    RoomItems { room: String },
    /// Print the room hierarchy
    Rooms {
        /// Subtree to print (default: everything)
        root: Option<RoomPath>,
    },
    /// Show one room
    Room { path: RoomPath },
    /// Set room fields (key=value, values starting with [ or { are read as JSON)
    SetRoom {
        path: RoomPath,
        #[arg(required = true)]
        fields: Vec<String>,
        /// Start from an empty record instead of the current one
        #[arg(long)]
        replace: bool,
    },
    /// Copy a local file into an item or room
    AddFile {
        owner: String,
        source: PathBuf,
        /// Name to store the file under (default: the source file name)
        #[arg(long)]
        name: Option<String>,
        /// Treat the owner as a room path
        #[arg(long)]
        room: bool,
    },
    /// Remove a file from an item or room
    RemoveFile {
        owner: String,
        name: String,
        /// Treat the owner as a room path
        #[arg(long)]
        room: bool,
    },
    /// Print the absolute path of an item or room file
    File {
        owner: String,
        name: String,
        /// Treat the owner as a room path
        #[arg(long)]
        room: bool,
    },
    /// Print the path of an item picture preview, generating it if needed
    Preview { id: ItemId, name: String },
    /// Print the path of a room picture preview, generating it if needed
    RoomPreview { path: RoomPath, name: String },
}

/// Where a file command points.
enum Owner {
    Item(ItemId),
    Room(RoomPath),
}

impl Owner {
    fn parse(owner: &str, room: bool) -> anyhow::Result<Self> {
        if room {
            Ok(Owner::Room(RoomPath::parse(owner)?))
        } else {
            Ok(Owner::Item(ItemId::parse(owner)?))
        }
    }
}

fn config_from_env() -> anyhow::Result<CoreConfig> {
    let env = |key: &str| std::env::var(key).ok();

    let storage_dir = storage_dir_from_env_value(env("INVENTORY_STORAGE_DIR"), env("STORAGE"));
    let cfg = CoreConfig::new(storage_dir)
        .with_transcoder_program(transcoder_program_from_env_value(env("INVENTORY_FFMPEG")))
        .with_preview_width(preview_width_from_env_value(env(
            "INVENTORY_PREVIEW_WIDTH",
        ))?)?
        .with_concurrency(concurrency_from_env_value(env("INVENTORY_CONCURRENCY"))?);
    Ok(cfg)
}

/// Builds a patch from `key=value` arguments.
fn patch_from_fields<P: DeserializeOwned>(fields: &[String]) -> anyhow::Result<P> {
    let mut map = Map::new();
    for field in fields {
        let (key, raw) = field
            .split_once('=')
            .with_context(|| format!("expected key=value, got '{}'", field))?;
        let value = if raw.starts_with('[') || raw.starts_with('{') {
            serde_json::from_str(raw).with_context(|| format!("invalid JSON for '{}'", key))?
        } else {
            Value::String(raw.to_string())
        };
        map.insert(key.trim().to_string(), value);
    }
    serde_json::from_value(Value::Object(map)).context("invalid field values")
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_outcome(what: &str, outcome: &WriteOutcome) {
    match outcome {
        WriteOutcome::Unchanged => println!("{}: unchanged", what),
        WriteOutcome::Created => println!("{}: created", what),
        WriteOutcome::Updated { archived } => {
            println!("{}: updated (previous version: {})", what, archived.display())
        }
    }
}

/// Entry point for the inventory CLI.
///
/// # Environment Variables
/// - `INVENTORY_STORAGE_DIR`: storage root holding `DB/` (fallback `STORAGE`, default "storage")
/// - `INVENTORY_FFMPEG`: transcoder executable (default: "ffmpeg")
/// - `INVENTORY_PREVIEW_WIDTH`: preview width in pixels (default: 300)
/// - `INVENTORY_CONCURRENCY`: "relaxed" (default) or "serialized"
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("inventory=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("Use 'inventory --help' for commands");
        return Ok(());
    };

    let cfg = Arc::new(config_from_env()?);
    tracing::debug!("storage root: {}", cfg.storage_dir().display());
    let inventory = InventoryService::with_ffmpeg(cfg);

    match command {
        Commands::Allocate { count } => {
            for id in inventory.allocator().allocate(count).await? {
                println!("{}", id);
            }
        }
        Commands::List => print_json(&inventory.collection().list_all().await?)?,
        Commands::Places => {
            for place in inventory.collection().distinct_places().await? {
                println!("{}", place);
            }
        }
        Commands::Tags => {
            for tag in inventory.collection().distinct_tags().await? {
                println!("{}", tag);
            }
        }
        Commands::Show { id } => print_json(&inventory.items().get_item(id).await?)?,
        Commands::Set {
            id,
            fields,
            replace,
            expected_date,
        } => {
            let patch: ItemPatch = patch_from_fields(&fields)?;
            let items = inventory.items();
            let outcome = match expected_date {
                Some(expected) => items.write_info_if_current(id, patch, &expected).await?,
                None if replace => items.write_info(id, patch).await?,
                None => items.update_info(id, patch).await?,
            };
            print_outcome(&id.to_string(), &outcome);
        }
        Commands::History { owner, room } => {
            let snapshots = match Owner::parse(&owner, room)? {
                Owner::Item(id) => inventory.items().history(id).await?,
                Owner::Room(path) => inventory.rooms().history(&path).await?,
            };
            for snapshot in snapshots {
                println!("{}", snapshot);
            }
        }
        Commands::RoomItems { room } => {
            print_json(&inventory.collection().list_by_room(&room).await?)?
        }
        Commands::Rooms { root } => {
            let root = root.unwrap_or_default();
            print_json(&inventory.rooms().build_tree(&root).await?)?
        }
        Commands::Room { path } => print_json(&inventory.rooms().get_room(&path).await?)?,
        Commands::SetRoom {
            path,
            fields,
            replace,
        } => {
            let patch: RoomPatch = patch_from_fields(&fields)?;
            let rooms = inventory.rooms();
            let outcome = if replace {
                rooms.write_info(&path, patch).await?
            } else {
                rooms.update_info(&path, patch).await?
            };
            print_outcome(&path.to_string(), &outcome);
        }
        Commands::AddFile {
            owner,
            source,
            name,
            room,
        } => {
            let name = match name {
                Some(name) => name,
                None => source
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(str::to_owned)
                    .with_context(|| format!("cannot take a name from {}", source.display()))?,
            };
            let name = AssetName::new(name)?;
            let mut reader = tokio::fs::File::open(&source)
                .await
                .with_context(|| format!("failed to open {}", source.display()))?;

            let mut upload = match Owner::parse(&owner, room)? {
                Owner::Item(id) => inventory.items().store_file(id, &name).await?,
                Owner::Room(path) => inventory.rooms().store_file(&path, &name).await?,
            };
            tokio::io::copy(&mut reader, &mut upload).await?;
            let stored = upload.finish().await?;
            println!("{}", stored.display());
        }
        Commands::RemoveFile { owner, name, room } => {
            let name = AssetName::new(name)?;
            let removed = match Owner::parse(&owner, room)? {
                Owner::Item(id) => inventory.items().remove_file(id, &name).await?,
                Owner::Room(path) => inventory.rooms().remove_file(&path, &name).await?,
            };
            if !removed {
                println!("{} was already absent", name);
            }
        }
        Commands::File { owner, name, room } => {
            let name = AssetName::new(name)?;
            let path = match Owner::parse(&owner, room)? {
                Owner::Item(id) => inventory.items().resolve_file(id, &name).await?,
                Owner::Room(path) => inventory.rooms().resolve_file(&path, &name).await?,
            };
            println!("{}", path.display());
        }
        Commands::Preview { id, name } => {
            let name = AssetName::new(name)?;
            println!("{}", inventory.items().preview(id, &name).await?.display());
        }
        Commands::RoomPreview { path, name } => {
            let name = AssetName::new(name)?;
            println!(
                "{}",
                inventory.rooms().preview(&path, &name).await?.display()
            );
        }
    }

    Ok(())
}
