#[path = "../bin_common.rs"]
mod common;

use clap::{Parser, Subcommand};
use common::{ConnectionArgs, print_snapshot};
use growatt_rs::{Inverter, RegisterBank};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "growatt-query")]
#[command(about = "Query and control a Growatt inverter via Modbus TCP")]
struct Args {
    #[command(flatten)]
    connection: ConnectionArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Read every field once and print it
    Snapshot,
    /// Read raw registers
    Read {
        /// First register address
        #[arg(long)]
        address: u16,

        /// Number of registers
        #[arg(long, default_value_t = 1)]
        count: u16,

        /// Register bank (input or holding)
        #[arg(long, default_value = "input")]
        bank: RegisterBank,
    },
    /// Write one holding register
    Write {
        #[arg(long)]
        address: u16,

        #[arg(long)]
        value: u16,
    },
    /// Set the active power limit in percent (0-100)
    PowerLimit { percent: i64 },
    /// Start power production
    Enable,
    /// Stop power production
    Disable,
    /// Check that the inverter answers
    Test,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("warn".parse()?))
        .init();

    let args = Args::parse();
    let config = args.connection.into_config()?;
    let mut inverter = Inverter::from_config(&config);

    println!("Connecting to {}...", config.socket_label());

    let result = run(&mut inverter, args.command).await;
    inverter.close().await;
    result
}

async fn run(
    inverter: &mut Inverter<growatt_rs::ModbusTcpTransport>,
    command: Command,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Snapshot => {
            inverter.connect().await?;
            let snapshot = inverter.collect_all().await;
            print_snapshot(inverter.name(), &snapshot);
        }
        Command::Read {
            address,
            count,
            bank,
        } => {
            let words = inverter.read_register(address, count, bank).await?;
            for (i, word) in words.iter().enumerate() {
                println!("  {} {:5}: {:5}  (0x{:04X})", bank, address as usize + i, word, word);
            }
        }
        Command::Write { address, value } => {
            inverter
                .write_register(address, value, RegisterBank::Holding)
                .await?;
            println!("Wrote {} to holding register {}", value, address);
        }
        Command::PowerLimit { percent } => {
            let outcome = inverter.set_power_limit(percent).await?;
            println!("Done: {}", outcome);
        }
        Command::Enable => {
            let outcome = inverter.set_inverter_enable(true).await?;
            println!("Done: {}", outcome);
        }
        Command::Disable => {
            let outcome = inverter.set_inverter_enable(false).await?;
            println!("Done: {}", outcome);
        }
        Command::Test => {
            let status = inverter.test_connection().await?;
            println!("Connected! Inverter status: {}", status);
        }
    }
    Ok(())
}
