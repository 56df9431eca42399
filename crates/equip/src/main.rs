//! Equip CLI
//!
//! Runs equipment creation against an in-memory document.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use equip::{
    ElectricalProfile, EquipConfig, EquipmentBridge, EquipmentRequest, EquipmentType,
    GeometryProfile, ProfileCatalog,
};
use equip_doc::{Document, DocumentWorld, ElementId, RaiseOutcome};

/// How long to wait for one creation before giving up.
const RESULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Electrical equipment creation tool
#[derive(Parser, Debug)]
#[command(name = "equip")]
#[command(about = "Create electrical equipment in a model document", long_about = None)]
struct Args {
    /// Path to a TOML config file (defaults to ./equip.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create equipment through the bridge
    Create {
        /// Equipment type (panel, transformer, generator, ups, switchgear, mcc)
        #[arg(short = 't', long = "type", value_name = "TYPE")]
        equipment_type: EquipmentType,

        /// Element name (defaults to the type's display name)
        #[arg(short, long)]
        name: Option<String>,

        /// Number of elements to create
        #[arg(long, default_value = "1")]
        count: usize,
    },

    /// Print the equipment profile tables
    Catalog,
}

#[derive(Serialize)]
struct CatalogRow<'a> {
    equipment_type: EquipmentType,
    name: &'static str,
    geometry: &'a GeometryProfile,
    electrical: &'a ElectricalProfile,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.log_json);

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?
        .block_on(async_main(args))
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("equip=info,equip_doc=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .init();
}

async fn async_main(args: Args) -> Result<()> {
    info!("Starting equip v{}", env!("CARGO_PKG_VERSION"));

    let config = EquipConfig::load(args.config.as_deref()).context("Failed to load config")?;

    match args.command {
        Command::Create {
            equipment_type,
            name,
            count,
        } => create(&config, equipment_type, name, count, args.json).await,
        Command::Catalog => print_catalog(&config.catalog()?, args.json),
    }
}

async fn create(
    config: &EquipConfig,
    equipment_type: EquipmentType,
    name: Option<String>,
    count: usize,
    json: bool,
) -> Result<()> {
    let document = Document::with_bindings(config.bindings()?);
    let world = DocumentWorld::with_document(document)?;
    let handle = world.handle();

    let bridge = EquipmentBridge::install(&handle, config)?;
    let (_subscription, mut results) = bridge.subscribe_channel();

    let base = name.unwrap_or_else(|| equipment_type.default_name().to_string());
    let mut failures = 0;

    for i in 0..count {
        let name = if count > 1 {
            format!("{}-{}", base, i + 1)
        } else {
            base.clone()
        };

        // One at a time: a second submit would replace an unconsumed request
        if bridge.submit(EquipmentRequest::new(equipment_type, name)) == RaiseOutcome::Disposed {
            bail!("Document worker stopped");
        }
        let result = tokio::time::timeout(RESULT_TIMEOUT, results.recv())
            .await
            .context("Timed out waiting for creation result")?
            .context("Result channel closed")?;

        if json {
            println!("{}", serde_json::to_string(&result)?);
        } else if let Some(id) = result.element_id {
            let offset = handle
                .element(ElementId(id))
                .await?
                .map(|e| e.offset.to_string())
                .unwrap_or_default();
            println!("{} (ID: {}) at {}", result.message, id, offset);
        } else {
            println!("Failed: {}", result.message);
        }

        if !result.success {
            failures += 1;
        }
    }

    let total = handle.element_count().await?;
    info!("Document holds {} element(s)", total);

    drop(bridge);
    world.shutdown();

    if failures > 0 {
        warn!("{} of {} creation(s) failed", failures, count);
        bail!("{failures} of {count} creation(s) failed");
    }
    Ok(())
}

fn print_catalog(catalog: &ProfileCatalog, json: bool) -> Result<()> {
    let types = EquipmentType::ALL
        .into_iter()
        .chain(std::iter::once(EquipmentType::Unclassified));

    let rows: Vec<CatalogRow<'_>> = types
        .map(|ty| CatalogRow {
            equipment_type: ty,
            name: ty.default_name(),
            geometry: catalog.geometry_for(ty),
            electrical: catalog.electrical_for(ty),
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!(
        "{:<22} {:>6} {:>6} {:>6} {:>9} {:>8} {:>10} {:>3} {:>8}",
        "TYPE", "W", "H", "D", "VOLTS", "AMPS", "WATTS", "PH", "RATING"
    );
    for row in rows {
        let g = row.geometry;
        let e = row.electrical;
        println!(
            "{:<22} {:>6} {:>6} {:>6} {:>9} {:>8} {:>10} {:>3} {:>8}",
            row.name, g.width, g.height, g.depth, e.voltage, e.current, e.power, e.phases, e.rating
        );
    }
    Ok(())
}
