use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use iso14b_rs::card::parse_atqb;
use iso14b_rs::crc::{crc_b_append, crc_b_verify, crc_picopass_append};
use iso14b_rs::timing::fwi_to_timeout_ticks;
use iso14b_rs::trace::TraceEntry;
use iso14b_rs::util::hex::{decode_hex, encode_hex, format_hex_compact};
use iso14b_rs::{init_logger, log_info};

#[derive(Parser)]
#[command(name = "iso14b-cli")]
#[command(about = "Offline utilities for ISO 14443 Type B frames")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Append a checksum to a hex frame
    Crc {
        frame: String,
        #[arg(short, long)]
        picopass: bool,
    },
    /// Verify the CRC-B of a hex frame
    Verify { frame: String },
    /// Parse an ATQB (CRC included) and print the card fields
    Atqb { frame: String },
    /// Print the frame waiting time for an FWI
    Fwt { fwi: u8 },
    /// Pretty-print a JSON trace file
    Trace { path: String },
}

fn main() -> anyhow::Result<()> {
    init_logger();

    let cli = Cli::parse();
    match cli.command {
        Commands::Crc { frame, picopass } => {
            let mut bytes = decode_hex(&frame).context("invalid hex frame")?;
            if picopass {
                crc_picopass_append(&mut bytes);
            } else {
                crc_b_append(&mut bytes);
            }
            println!("{}", encode_hex(&bytes));
        }
        Commands::Verify { frame } => {
            let bytes = decode_hex(&frame).context("invalid hex frame")?;
            if crc_b_verify(&bytes) {
                log_info("CRC-B ok");
            } else {
                bail!("CRC-B check failed");
            }
        }
        Commands::Atqb { frame } => {
            let bytes = decode_hex(&frame).context("invalid hex frame")?;
            if !crc_b_verify(&bytes) {
                bail!("CRC-B check failed");
            }
            let atqb = parse_atqb(&bytes[..bytes.len() - 2])?;
            println!("pupi:      {}", format_hex_compact(&atqb.pupi));
            println!("app data:  {}", format_hex_compact(&atqb.app_data));
            println!("max frame: {} bytes", atqb.max_frame_size());
            println!("fwi:       {}", atqb.fwi());
            println!("14443-4:   {}", atqb.protocol_type() & 1 != 0);
        }
        Commands::Fwt { fwi } => {
            let ticks = fwi_to_timeout_ticks(fwi);
            println!("{ticks} ticks ({:.3} ms)", ticks as f64 / 3390.0);
        }
        Commands::Trace { path } => {
            let json = std::fs::read_to_string(&path).context("reading trace file")?;
            let entries: Vec<TraceEntry> =
                serde_json::from_str(&json).context("parsing trace file")?;
            for e in entries {
                println!(
                    "{:>10} {:>10} {:?} {}",
                    e.sof_tick,
                    e.eof_tick,
                    e.direction,
                    format_hex_compact(&e.data)
                );
            }
        }
    }

    Ok(())
}
