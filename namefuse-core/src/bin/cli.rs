//! namefuse CLI - developer utilities for names, fuses and wire payloads.

use clap::{Parser, Subcommand};
use namefuse::{
    engine::{check_burnable, check_settable},
    labelhash, namehash,
    wire::{self, TransferData},
    Address, Fuses, Node, WrapperConfig,
};
use std::io::{self, Read};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "namefuse")]
#[command(about = "Fuse and expiry permissions for wrapped names", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Hash a dotted name into its node
    Namehash {
        /// Dotted name, e.g. sub.alice.eth. Empty for the root.
        name: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Hash a single label
    Labelhash {
        label: String,
    },

    /// Explain a fuse mask
    Fuses {
        /// Fuse names joined with '|', or a decimal / 0x hex mask
        mask: Fuses,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Encode or decode registrar delivery payloads
    #[command(subcommand)]
    TransferData(TransferDataCommand),

    /// Check a wrapper configuration file
    ValidateConfig {
        /// Path to YAML config file
        config: PathBuf,
    },
}

#[derive(Subcommand)]
enum TransferDataCommand {
    /// Build a payload and print it as hex
    Encode {
        #[arg(short, long)]
        label: String,

        #[arg(short, long)]
        owner: Address,

        /// Owner-controlled fuses to burn on arrival
        #[arg(short, long, default_value = "CAN_DO_EVERYTHING")]
        fuses: Fuses,

        #[arg(short, long, default_value = "0x0000000000000000000000000000000000000000")]
        resolver: Address,
    },

    /// Decode a hex payload. Use - to read from stdin.
    Decode {
        payload: String,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Namehash { name, json } => handle_namehash(&name, json)?,
        Commands::Labelhash { label } => println!("{}", labelhash(&label)),
        Commands::Fuses { mask, json } => handle_fuses(mask, json)?,
        Commands::TransferData(TransferDataCommand::Encode {
            label,
            owner,
            fuses,
            resolver,
        }) => handle_encode(label, owner, fuses, resolver)?,
        Commands::TransferData(TransferDataCommand::Decode { payload }) => {
            handle_decode(payload)?
        }
        Commands::ValidateConfig { config } => handle_validate_config(config)?,
    }

    Ok(())
}

// ============================================================================
// Handlers
// ============================================================================

fn handle_namehash(name: &str, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let node = namehash(name);
    if !json {
        println!("{}", node);
        return Ok(());
    }

    let labels: Vec<serde_json::Value> = name
        .split('.')
        .filter(|l| !l.is_empty())
        .map(|l| serde_json::json!({ "label": l, "labelhash": labelhash(l).to_string() }))
        .collect();
    let info = serde_json::json!({
        "name": name,
        "node": node.to_string(),
        "is_root": node == Node::ROOT,
        "labels": labels,
    });
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}

fn handle_fuses(mask: Fuses, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let owner = mask.mask(Fuses::OWNER_CONTROLLED);
    let parent = mask.mask(Fuses::PARENT_CONTROLLED);
    let settable = check_settable(&Node::ROOT, mask).is_ok();
    let needs_lock = check_burnable(&Node::ROOT, mask).is_err();

    if json {
        let info = serde_json::json!({
            "mask": format!("0x{:08x}", mask.bits()),
            "names": mask.names(),
            "owner_controlled": format!("0x{:04x}", owner.bits()),
            "parent_controlled": format!("0x{:08x}", parent.bits()),
            "settable": settable,
            "requires_emancipation_and_lock": needs_lock,
        });
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!("Mask:              0x{:08x}", mask.bits());
    println!("Fuses:             {}", mask);
    println!("Owner-controlled:  {}", owner);
    println!("Parent-controlled: {}", parent);
    println!("Settable:          {}", if settable { "yes" } else { "no" });
    if needs_lock {
        println!();
        println!(
            "Note: owner-controlled fuses also need {} on the same name.",
            Fuses::EMANCIPATED_AND_LOCKED
        );
    }
    Ok(())
}

fn handle_encode(
    label: String,
    owner: Address,
    fuses: Fuses,
    resolver: Address,
) -> Result<(), Box<dyn std::error::Error>> {
    if !fuses.is_subset_of(Fuses::OWNER_CONTROLLED) {
        return Err(format!("only owner-controlled fuses can be delivered, got {}", fuses).into());
    }
    let data = TransferData::new(label, owner)
        .with_fuses(fuses.bits() as u16)
        .with_resolver(resolver);
    println!("{}", wire::encode_hex(&data)?);
    Ok(())
}

fn handle_decode(payload: String) -> Result<(), Box<dyn std::error::Error>> {
    let payload = if payload == "-" {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        payload
    };

    let data = wire::decode_hex(&payload)?;
    let info = serde_json::json!({
        "label": data.label,
        "labelhash": labelhash(&data.label).to_string(),
        "owner": data.owner.to_string(),
        "fuses": data.fuses().to_string(),
        "resolver": data.resolver.to_string(),
    });
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}

fn handle_validate_config(config_path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    println!("Validating {}...\n", config_path.display());

    let config = WrapperConfig::from_file(&config_path)?;

    match config.validate() {
        Ok(()) => {
            println!("✅ Configuration is valid.\n");
            println!("Summary:");
            println!("  Native zone:      {} ({})", config.native_zone, config.native_node());
            println!("  Grace period:     {}s", config.grace_period_secs);
            println!("  Max label length: {}", config.max_label_length);
            println!("  Wrapper:          {}", config.wrapper_address);
            println!("  Admin:            {}", config.admin);
        }
        Err(errors) => {
            println!("❌ Configuration has {} error(s):\n", errors.len());
            for e in errors {
                println!("  • {}: {}", e.location, e.message);
            }
            println!();
            std::process::exit(1);
        }
    }

    Ok(())
}
