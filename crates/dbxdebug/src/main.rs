use std::io::{self, Write};
use std::process;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use dbxdebug_core::config::{DEFAULT_HOST, DEFAULT_PORT};
use dbxdebug_core::prelude::*;
use dbxdebug_protocol::exchange::{DEFAULT_MAX_ATTEMPTS, DEFAULT_TIMEOUT};
use dbxdebug_protocol::hex;
use dbxdebug_utils::{hexdump, info, init_logging_with_level, logging, warn, LogLevel};
use thiserror::Error;

/// DOSBox-X remote debug client.
#[derive(Parser, Debug)]
#[command(name = "dbxdebug")]
#[command(version)]
#[command(about = "DOSBox-X remote debug client", long_about = None)]
struct Cli
{
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands
{
    /// GDB debugging commands
    Gdb(GdbArgs),
}

#[derive(Args, Debug)]
struct GdbArgs
{
    /// GDB server host
    #[arg(long, env = "DBX_GDB_HOST", default_value = DEFAULT_HOST)]
    host: String,
    /// GDB server port
    #[arg(long, env = "DBX_GDB_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,
    /// Connect and reply timeout in milliseconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT.as_secs() * 1000)]
    timeout_ms: u64,
    /// Transmissions per request before giving up
    #[arg(long, default_value_t = DEFAULT_MAX_ATTEMPTS)]
    retries: u32,
    /// Width of segment registers in the register blob (16 or 32)
    #[arg(long, default_value = "16")]
    segment_width: SegmentWidth,
    /// Log every packet sent and received (shown with RUST_LOG=trace)
    #[arg(long)]
    trace_packets: bool,
    #[command(subcommand)]
    command: GdbCommand,
}

#[derive(Subcommand, Debug)]
enum GdbCommand
{
    /// Read memory from target
    ReadMem
    {
        /// Address: segment:offset (B800:0000) or flat hex (0xb8000)
        address: String,
        /// Number of bytes to read
        length: usize,
        /// Output as hex dump instead of raw bytes
        #[arg(long = "hex")]
        hex: bool,
    },
    /// Write memory to target
    WriteMem
    {
        /// Address: segment:offset or flat hex
        address: String,
        /// Bytes as a hex string (e.g. deadbeef)
        data: String,
    },
    /// Read CPU registers
    Registers,
    /// Set one CPU register
    SetReg
    {
        /// Register name (eax, eip, cs, ...)
        name: String,
        /// New value in hex (0x1234 or 1234)
        value: String,
    },
    /// Set breakpoint at address
    Break
    {
        /// Address: segment:offset or flat hex
        address: String,
        /// Use a hardware breakpoint
        #[arg(long)]
        hardware: bool,
    },
    /// Remove breakpoint at address
    Delete
    {
        /// Address: segment:offset or flat hex
        address: String,
        /// Remove a hardware breakpoint
        #[arg(long)]
        hardware: bool,
    },
    /// Single-step one instruction
    Step,
    /// Continue execution until the target stops (Ctrl+C to interrupt)
    Continue,
}

/// Everything that can end a command with an error.
#[derive(Error, Debug)]
enum CliError
{
    #[error(transparent)]
    Debugger(#[from] DbxError),

    #[error("{0}")]
    InvalidInput(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("{0}")]
    Refused(String),
}

fn main()
{
    let cli = Cli::parse();

    let level = if cli.debug {
        LogLevel::Debug
    } else if cli.verbose {
        LogLevel::Info
    } else {
        LogLevel::Warn
    };
    let log_guard = match logging::format_from_env().and_then(|format| init_logging_with_level(level, format)) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Gdb(args) => run_gdb(args),
    };
    if let Err(e) = result {
        eprintln!("Error: {e}");
        // process::exit skips destructors; flush the log file first.
        drop(log_guard);
        process::exit(1);
    }
}

fn run_gdb(args: GdbArgs) -> Result<(), CliError>
{
    let config = ClientConfig::new(args.host, args.port)
        .with_timeout(Duration::from_millis(args.timeout_ms))
        .with_max_attempts(args.retries)
        .with_segment_width(args.segment_width)
        .with_trace_packets(args.trace_packets);

    // Validate arguments before touching the network.
    match args.command {
        GdbCommand::ReadMem { address, length, hex } => {
            let address = resolve(&address)?;
            let data = Client::connect(config)?.read_memory(address, length)?;
            let mut stdout = io::stdout().lock();
            if hex {
                for line in hexdump(&data, address.value()) {
                    writeln!(stdout, "{line}")?;
                }
            } else {
                stdout.write_all(&data)?;
            }
            stdout.flush()?;
        }
        GdbCommand::WriteMem { address, data } => {
            let target = resolve(&address)?;
            let bytes = parse_hex_data(&data)?;
            Client::connect(config)?.write_memory(target, &bytes)?;
            println!("Wrote {} bytes to {address}", bytes.len());
        }
        GdbCommand::Registers => {
            let registers = Client::connect(config)?.read_registers()?;
            println!("{registers}");
        }
        GdbCommand::SetReg { name, value } => {
            let register: Register = name.parse().map_err(CliError::InvalidInput)?;
            let value = parse_register_value(&value)?;
            Client::connect(config)?.write_register(register, value)?;
            println!("{register} = {value:#x}");
        }
        GdbCommand::Break { address, hardware } => {
            let breakpoint = breakpoint_at(&address, hardware)?;
            if !Client::connect(config)?.set_breakpoint(breakpoint)? {
                return Err(CliError::Refused(format!("Failed to set breakpoint at {address}")));
            }
            println!("Breakpoint set at {address}");
        }
        GdbCommand::Delete { address, hardware } => {
            let breakpoint = breakpoint_at(&address, hardware)?;
            if !Client::connect(config)?.clear_breakpoint(breakpoint)? {
                return Err(CliError::Refused(format!("Failed to remove breakpoint at {address}")));
            }
            println!("Breakpoint removed at {address}");
        }
        GdbCommand::Step => {
            let stop = Client::connect(config)?.step()?;
            print_stop(&stop);
        }
        GdbCommand::Continue => {
            let client = Client::connect(config)?;
            println!("Continuing... (Ctrl+C to interrupt)");
            match continue_until_stop(client)? {
                Some(stop) => print_stop(&stop),
                None => println!("\nInterrupted"),
            }
        }
    }
    Ok(())
}

fn print_stop(stop: &StopReply)
{
    println!("Stop reason: {stop} ({})", stop.describe());
}

fn breakpoint_at(address: &str, hardware: bool) -> Result<Breakpoint, CliError>
{
    let address = resolve(address)?;
    Ok(if hardware {
        Breakpoint::hardware(address)
    } else {
        Breakpoint::software(address)
    })
}

/// Resume the target on a blocking worker and race the stop reply against
/// Ctrl+C. Returns `None` if the user interrupted.
fn continue_until_stop(mut client: Client) -> Result<Option<StopReply>, CliError>
{
    let cancel = client.cancel_handle()?;
    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;

    runtime.block_on(async move {
        let mut worker = tokio::task::spawn_blocking(move || client.continue_execution());

        tokio::select! {
            joined = &mut worker => {
                let stop = joined.map_err(|e| CliError::Io(io::Error::other(e)))??;
                Ok::<_, CliError>(Some(stop))
            }
            signal = tokio::signal::ctrl_c() => {
                signal?;
                info!("interrupt received; closing connection to stop waiting");
                cancel.cancel()?;
                // The worker now fails with a transport error; only its exit matters.
                if let Ok(Err(e)) = worker.await {
                    warn!(error = %e, "continue aborted");
                }
                Ok::<_, CliError>(None)
            }
        }
    })
}

fn parse_hex_data(text: &str) -> Result<Vec<u8>, CliError>
{
    let compact: String = text.split_whitespace().collect();
    hex::decode(compact.as_bytes()).map_err(|e| CliError::InvalidInput(format!("invalid hex data {text:?}: {e}")))
}

fn parse_register_value(text: &str) -> Result<u32, CliError>
{
    let trimmed = text.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    u32::from_str_radix(digits, 16)
        .map_err(|e| CliError::InvalidInput(format!("invalid register value {text:?}: {e}")))
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn parses_gdb_read_mem()
    {
        let cli = Cli::try_parse_from(["dbxdebug", "gdb", "--port", "1234", "read-mem", "B800:0000", "160", "--hex"])
            .unwrap();
        let Commands::Gdb(args) = cli.command;
        assert_eq!(args.port, 1234);
        assert_eq!(args.segment_width, SegmentWidth::Bits16);
        assert!(matches!(
            args.command,
            GdbCommand::ReadMem {
                length: 160,
                hex: true,
                ..
            }
        ));
    }

    #[test]
    fn global_flags_work_after_subcommand()
    {
        let cli = Cli::try_parse_from(["dbxdebug", "gdb", "--segment-width", "32", "step", "--debug"]).unwrap();
        assert!(cli.debug);
        let Commands::Gdb(args) = cli.command;
        assert_eq!(args.segment_width, SegmentWidth::Bits32);
    }

    #[test]
    fn rejects_bad_segment_width()
    {
        assert!(Cli::try_parse_from(["dbxdebug", "gdb", "--segment-width", "8", "registers"]).is_err());
    }

    #[test]
    fn hex_data_allows_spaces()
    {
        assert_eq!(parse_hex_data("de ad BE ef").unwrap(), [0xde, 0xad, 0xbe, 0xef]);
        assert!(parse_hex_data("abc").is_err());
    }

    #[test]
    fn register_values_are_hex()
    {
        assert_eq!(parse_register_value("0x100").unwrap(), 0x100);
        assert_eq!(parse_register_value("b800").unwrap(), 0xb800);
        assert!(parse_register_value("xyz").is_err());
        assert!(parse_register_value("100000000").is_err());
    }
}
