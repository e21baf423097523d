use anyhow::{Context, Result};
use clap::Parser;

use bqflash::constants::{DEFAULT_I2C_PORT, ROM_ADDRESS};
use bqflash::{format, protocol};

#[derive(clap::Parser)]
#[command(
    name = "bqflash",
    about = "Firmware flasher for the TI bq34z100-g1 fuel gauge",
    version
)]
struct Cli {
    /// Print every bus transaction
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Erase the data flash and program it from an .srec image
    Flash {
        /// The path to the firmware .srec file
        path: String,
        /// The i2c port to use, e.g. 1 for /dev/i2c-1
        #[arg(short, long, default_value_t = DEFAULT_I2C_PORT)]
        port: u8,
    },
    /// Validate an .srec image without touching the bus
    Check {
        /// The path to the firmware .srec file
        path: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        simplelog::LevelFilter::Debug
    } else {
        simplelog::LevelFilter::Info
    };
    let _ = simplelog::TermLogger::init(
        level,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    );

    match cli.command {
        Commands::Flash { path, port } => {
            log::info!("Using {} to flash fuel gauge on /dev/i2c-{}", path, port);
            if let Err(e) = bqflash::flash_file(&path, port) {
                if e.is_irrecoverable() {
                    log::error!("!!! The fuel gauge data flash is only partially programmed.");
                    log::error!(
                        "!!! The gauge may be stuck in ROM mode at {:#04x}; reflash before use.",
                        ROM_ADDRESS
                    );
                }
                return Err(e).with_context(|| format!("flashing {} failed", path));
            }
        }
        Commands::Check { path } => {
            let records = format::read_image_from_file(&path)
                .with_context(|| format!("{} is not a usable image", path))?;
            let bytes: usize = records.iter().map(|r| r.data().len()).sum();
            let checksum = records
                .iter()
                .fold(protocol::erase_seed(), |acc, r| acc.extend(r.data()));
            log::info!("{} records, {} bytes", records.len(), bytes);
            log::info!("DoD@EoC checksum: {}", checksum);
        }
    }

    Ok(())
}
