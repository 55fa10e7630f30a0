mod layout;
mod replay;
mod script;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use keypad_core::{keymap, TwiConfig};
use std::fs;

#[derive(Parser)]
#[command(name = "keypad-cli")]
#[command(about = "Bench tool for the PCA9555 keypad firmware")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the keypad layout with the scan bit of every key
    Layout {
        /// Write an HTML/SVG rendering to this file instead
        #[arg(long)]
        html: Option<String>,
    },
    /// Compute TWBR and the prescaler for a CPU clock and SCL frequency
    Twbr {
        #[arg(long, default_value_t = 16_000_000)]
        cpu_hz: u32,
        #[arg(long, default_value_t = 100_000)]
        scl_hz: u32,
    },
    /// Replay a key timeline through the scanner against a simulated PCA9555
    Replay {
        /// Path to the timeline script
        script: String,
        /// Number of address phases the expander NACKs before answering
        #[arg(long, default_value_t = 0)]
        busy: u32,
        /// Print bus statistics after the replay
        #[arg(short, long)]
        verbose: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Layout { html } => match html {
            Some(path) => {
                fs::write(&path, layout::generate_html())
                    .with_context(|| format!("writing {}", path))?;
                println!("Layout written to {}", path);
            }
            None => print!("{}", layout::render_text()),
        },
        Command::Twbr { cpu_hz, scl_hz } => {
            let bit_rate = TwiConfig::new(cpu_hz, scl_hz)
                .bit_rate()
                .map_err(|err| anyhow!("{} Hz SCL from {} Hz CPU: {}", scl_hz, cpu_hz, err))?;
            println!(
                "TWBR = {}, prescaler = {} (TWPS = {})",
                bit_rate.twbr,
                bit_rate.prescaler.factor(),
                bit_rate.prescaler as u8
            );
            println!("Actual SCL: {} Hz", bit_rate.scl_hz(cpu_hz));
        }
        Command::Replay {
            script: path,
            busy,
            verbose,
        } => {
            let contents =
                fs::read_to_string(&path).with_context(|| format!("reading {}", path))?;
            let frames = script::parse_script(&contents).context("parsing key timeline")?;

            let report = replay::replay(&frames, busy)?;
            for event in &report.events {
                match keymap::translate(event.edges) {
                    Some(key) => println!("{:>6} ms  key {}", event.at_ms, key),
                    None => println!(
                        "{:>6} ms  {} keys at once (0x{:04X})",
                        event.at_ms,
                        event.edges.count_zeros(),
                        event.edges
                    ),
                }
            }
            println!(
                "{} frames, {} debounced scans, {} key events",
                frames.len(),
                report.scans,
                report.events.len()
            );

            if verbose {
                let stats = report.stats;
                println!(
                    "Bus: {} starts ({} repeated), {} stops, {} address NACKs",
                    stats.starts, stats.repeated_starts, stats.stops, stats.address_nacks
                );
                println!(
                    "     {} bytes written, {} bytes read",
                    stats.bytes_written, stats.bytes_read
                );
            }
        }
    }

    Ok(())
}
