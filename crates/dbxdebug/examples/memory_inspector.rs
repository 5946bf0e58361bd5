//! Memory Inspector Example
//!
//! Reads and writes DOS memory through the DOSBox-X GDB stub.
//!
//! ## What this example does:
//!
//! 1. Connects to the stub (default `localhost:2159`)
//! 2. Shows the BIOS tick counter at `0040:006C`
//! 3. Dumps the first text row of the screen at `B800:0000`
//! 4. Writes a message into that row
//! 5. Reads it back to verify, then restores the original row
//!
//! ## Usage:
//!
//! ```bash
//! # Start DOSBox-X with its GDB server enabled, then:
//! cargo run --example memory_inspector [host] [port]
//! ```

use std::process;

use dbxdebug_core::prelude::*;
use dbxdebug_utils::{hexdump, init_logging};

/// One 80-column text row: character and attribute byte per cell.
const TEXT_ROW_BYTES: usize = 160;

fn main()
{
    let _log_guard = match init_logging() {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };

    let args: Vec<String> = std::env::args().collect();
    let mut config = ClientConfig::default();
    if let Some(host) = args.get(1) {
        config.host.clone_from(host);
    }
    if let Some(port) = args.get(2) {
        config.port = match port.parse() {
            Ok(port) => port,
            Err(e) => {
                eprintln!("Error: Invalid port '{port}': {e}");
                process::exit(1);
            }
        };
    }

    println!("dbxdebug Memory Inspector");
    println!("=========================");
    println!("Stub: {}\n", config.address());

    if let Err(e) = inspect_memory(config) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
    println!("\nMemory inspection completed successfully");
}

fn inspect_memory(config: ClientConfig) -> DbxResult<()>
{
    let mut client = Client::connect(config)?;

    let ticks_at = resolve("0040:006C")?;
    let ticks = client.read_memory(ticks_at, 4)?;
    let ticks = u32::from_le_bytes([ticks[0], ticks[1], ticks[2], ticks[3]]);
    println!("BIOS tick counter at {ticks_at}: {ticks} (~{} s since midnight)", u64::from(ticks) * 10 / 182);
    println!();

    let row = resolve("B800:0000")?;
    println!("First text row at {row}:");
    let original = client.read_memory(row, TEXT_ROW_BYTES)?;
    for line in hexdump(&original, row.value()) {
        println!("   {line}");
    }
    println!();

    let message = b"Hello from dbxdebug";
    let cells: Vec<u8> = message.iter().flat_map(|&ch| [ch, 0x1f]).collect();
    println!("Writing {:?} (white on blue):", String::from_utf8_lossy(message));
    client.write_memory(row, &cells)?;

    let verify = client.read_memory(row, cells.len())?;
    if verify == cells {
        println!("   Write verified");
    } else {
        println!("   Write verification failed!");
    }

    client.write_memory(row, &original)?;
    println!("   Original row restored");

    if let Some(stats) = client.stats() {
        println!(
            "\n{} exchanges, {} retransmissions",
            stats.exchanges, stats.retransmissions
        );
    }
    client.disconnect();
    Ok(())
}
