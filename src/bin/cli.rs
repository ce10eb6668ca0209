//! EepStore CLI
//!
//! Prepares and inspects EEPROM image files on the host.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use eepstore::{Config, FileTransport, NoDelay, RecordStore, StoreError};
use tracing_subscriber::{fmt, EnvFilter};

/// EepStore CLI
#[derive(Parser, Debug)]
#[command(name = "eepstore-cli")]
#[command(about = "Create, format, wipe and inspect EEPROM record images")]
#[command(version)]
struct Args {
    /// Image file
    #[arg(short, long)]
    image: PathBuf,

    /// Device page size in bytes
    #[arg(short, long, default_value = "32")]
    page_size: u32,

    /// Directory slots reserved at the front of the device
    #[arg(short, long, default_value = "20")]
    max_records: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a zero-filled image with an empty directory
    Create {
        /// Device capacity in bytes
        #[arg(short, long, default_value = "4000")]
        capacity: u32,
    },

    /// Write an empty directory to an existing image
    Format,

    /// Zero every byte of an existing image
    Wipe,

    /// Print the directory and every record payload
    Inspect,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,eepstore=debug"));

    fmt().with_env_filter(filter).with_target(true).init();

    let args = Args::parse();

    tracing::info!("EepStore CLI v{}", eepstore::VERSION);
    tracing::info!("Image: {}", args.image.display());

    if let Err(e) = run(&args) {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> eepstore::Result<()> {
    match &args.command {
        Commands::Create { capacity } => {
            let transport = FileTransport::create(&args.image, *capacity, args.page_size)?;
            let config = config_for(args, *capacity);
            RecordStore::format_with_delay(config, transport, NoDelay)?;
            println!("Created {} byte image", capacity);
        }

        Commands::Format => {
            let transport = FileTransport::open(&args.image, args.page_size)?;
            let config = config_for(args, transport.capacity());
            RecordStore::format_with_delay(config, transport, NoDelay)?;
            println!("Formatted");
        }

        Commands::Wipe => {
            let transport = FileTransport::open(&args.image, args.page_size)?;
            let config = config_for(args, transport.capacity());
            let mut store = match RecordStore::open_with_delay(config.clone(), transport, NoDelay) {
                Ok(store) => store,
                // An unreadable directory only needs a handle; wipe zeroes it anyway
                Err(StoreError::CorruptDirectory(reason)) => {
                    tracing::warn!("Directory unreadable ({}), formatting before wipe", reason);
                    let transport = FileTransport::open(&args.image, args.page_size)?;
                    RecordStore::format_with_delay(config, transport, NoDelay)?
                }
                Err(e) => return Err(e),
            };
            store.wipe()?;
            println!("Wiped");
        }

        Commands::Inspect => {
            let transport = FileTransport::open(&args.image, args.page_size)?;
            let config = config_for(args, transport.capacity());
            let mut store = RecordStore::open_with_delay(config, transport, NoDelay)?;
            inspect(&mut store)?;
        }
    }

    Ok(())
}

fn config_for(args: &Args, capacity: u32) -> Config {
    Config::builder()
        .capacity(capacity)
        .page_size(args.page_size)
        .max_records(args.max_records)
        .build()
}

/// Directory in slot order, one line per record
fn inspect(store: &mut RecordStore<FileTransport, NoDelay>) -> eepstore::Result<()> {
    let slots = store.directory_slots()?;
    println!("Header count: {}", slots.len());

    for descriptor in &slots {
        let payload = store.read_raw(&descriptor.name)?;
        println!(
            "Name: {} Version: {} OW: {} Size: {} Addr: {} Value: {:?}",
            descriptor.name,
            descriptor.version,
            descriptor.overwrite_protected as u8,
            descriptor.size,
            descriptor.address,
            payload
        );
    }

    println!("Free bytes: {}", store.free_space());
    Ok(())
}
