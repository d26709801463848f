//! bpeeprom - read and write a 24xx I2C EEPROM through a Bus Pirate
//!
//! Each byte (or batch of bytes) is its own round trip: binary mode, I2C
//! mode, the transfer, and back to the Bus Pirate's user terminal.

use std::io::{BufRead, Read, Write};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use log::info;

use buspirate_eeprom::sim::SimulatedBusPirate;
use buspirate_eeprom::{BatchPolicy, BusPirate, Config, Eeprom, EepromConfig, Ending};

/// Parse a string as a hex or decimal address
fn parse_address(s: &str) -> Result<usize, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        usize::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<usize>().map_err(|e| format!("Invalid number: {}", e))
    }
}

#[derive(Parser)]
#[command(name = "bpeeprom")]
#[command(author, version, about = "Bus Pirate I2C EEPROM reader/writer", long_about = None)]
struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Serial port the Bus Pirate is attached to
    #[arg(
        short,
        long,
        env = "BUSPIRATE_PORT",
        default_value = "/dev/ttyUSB0",
        global = true
    )]
    port: String,

    /// Read timeout in milliseconds
    #[arg(long, default_value_t = 100, global = true)]
    timeout_ms: u64,

    /// Stalled reads tolerated per echo
    #[arg(long, default_value_t = 5, global = true)]
    retries: u32,

    /// Talk to an in-process simulated Bus Pirate instead of the serial port
    #[arg(long, global = true)]
    simulate: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read from the EEPROM until the end marker
    Read {
        /// First address to read
        #[arg(short, long, default_value = "0", value_parser = parse_address)]
        start: usize,

        /// Read at most this many bytes
        #[arg(short, long, default_value_t = 256)]
        limit: usize,

        /// Print a hex dump instead of the raw bytes
        #[arg(long)]
        hex: bool,
    },

    /// Write text to the EEPROM (one line from stdin if TEXT is omitted)
    Write {
        text: Option<String>,

        /// First address to write
        #[arg(short, long, default_value = "0", value_parser = parse_address)]
        start: usize,

        /// One session per byte instead of batched writes
        #[arg(long)]
        bytewise: bool,

        /// Batch up to a full page instead of half a page
        #[arg(long, conflicts_with = "bytewise")]
        full_page: bool,

        /// Store the end marker after the data (always done for text from stdin)
        #[arg(long)]
        mark_end: bool,
    },
}

/// `RUST_LOG` (default `info`), raised to debug or trace by `-v`/`-vv`.
fn logger(verbose: u8) -> env_logger::Builder {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    match verbose {
        0 => {}
        1 => {
            builder.filter_level(log::LevelFilter::Debug);
        }
        _ => {
            builder.filter_level(log::LevelFilter::Trace);
        }
    }
    builder
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logger(cli.verbose).init();

    let config = Config::builder()
        .timeout(std::time::Duration::from_millis(cli.timeout_ms))
        .read_retries(cli.retries)
        .build();

    if cli.simulate {
        info!("Using the simulated Bus Pirate");
        let bus = BusPirate::new(SimulatedBusPirate::new(), &config);
        run(bus, cli.command)
    } else {
        let bus = buspirate_eeprom::open(&cli.port, &config)
            .with_context(|| format!("Failed to open {}", cli.port))?;
        run(bus, cli.command)
    }
}

fn run<P: Read + Write>(bus: BusPirate<P>, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Read { start, limit, hex } => {
            let mut eeprom = Eeprom::new(bus, EepromConfig::default());
            eeprom.seek(start)?;
            let outcome = eeprom.read(limit)?;
            if hex {
                print_hex(start, &outcome.data);
            } else {
                let mut stdout = std::io::stdout().lock();
                stdout.write_all(&outcome.data)?;
                stdout.write_all(b"\n")?;
            }
            if outcome.ending == Ending::Exhausted {
                info!("No end marker found");
            }
            Ok(())
        }
        Commands::Write {
            text,
            start,
            bytewise,
            full_page,
            mark_end,
        } => {
            let mark_end = wants_end_marker(text.as_deref(), mark_end);
            let data = match text {
                Some(text) => text.into_bytes(),
                None => read_line()?,
            };
            let batching = if full_page {
                BatchPolicy::FullPage
            } else {
                BatchPolicy::HalfPage
            };
            let config = EepromConfig::builder().batching(batching).build();
            let mut eeprom = Eeprom::new(bus, config);
            eeprom.seek(start)?;

            let outcome = if bytewise {
                eeprom.write_bytewise(&data)?
            } else {
                eeprom.write(&data)?
            };
            println!(
                "Wrote {} bytes at 0x{start:02X} in {} round trips",
                outcome.written, outcome.rounds
            );
            if mark_end {
                eeprom.mark_end()?;
            }
            Ok(())
        }
    }
}

/// Text typed at the prompt always gets an end marker, so a later `read`
/// stops where it ends.
fn wants_end_marker(text: Option<&str>, mark_end: bool) -> bool {
    mark_end || text.is_none()
}

/// One line from stdin, newline included so the writer stops at it.
fn read_line() -> anyhow::Result<Vec<u8>> {
    eprint!("Text to write: ");
    let mut line = Vec::new();
    std::io::stdin().lock().read_until(b'\n', &mut line)?;
    if line.is_empty() {
        bail!("Nothing to write");
    }
    Ok(line)
}

fn print_hex(start: usize, data: &[u8]) {
    for (row, chunk) in data.chunks(16).enumerate() {
        let bytes: Vec<String> = chunk.iter().map(|b| format!("{b:02X}")).collect();
        println!("{:04X}: {}", start + row * 16, bytes.join(" "));
    }
}
