use clap::Args;
use growatt_rs::config::{
    DEFAULT_NAME, DEFAULT_PORT, DEFAULT_POLL_INTERVAL_SECS, DEFAULT_TIMEOUT_SECS, DEFAULT_UNIT_ID,
};
use growatt_rs::{Field, InverterConfig, Snapshot};
use std::time::Duration;

/// Connection options shared by every binary.
#[derive(Args, Debug)]
pub struct ConnectionArgs {
    /// Inverter (or Modbus gateway) host name or IP address
    #[arg(long)]
    pub host: String,

    /// Modbus TCP port
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Modbus unit (slave) id, 1-247
    #[arg(short, long, default_value_t = DEFAULT_UNIT_ID)]
    pub unit_id: u8,

    /// Per-request timeout in seconds, 1-30
    #[arg(short, long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout: u64,

    /// Name used in logs and metric labels
    #[arg(long, default_value = DEFAULT_NAME)]
    pub name: String,
}

impl ConnectionArgs {
    #[allow(dead_code)]
    pub fn into_config(self) -> growatt_rs::Result<InverterConfig> {
        self.into_config_with_poll(DEFAULT_POLL_INTERVAL_SECS)
    }

    pub fn into_config_with_poll(self, poll_interval: u64) -> growatt_rs::Result<InverterConfig> {
        let config = InverterConfig {
            name: self.name,
            host: self.host,
            port: self.port,
            unit_id: self.unit_id,
            timeout: Duration::from_secs(self.timeout),
            poll_interval: Duration::from_secs(poll_interval),
        };
        config.validate()?;
        Ok(config)
    }
}

#[allow(dead_code)]
pub fn print_snapshot(name: &str, snapshot: &Snapshot) {
    println!("═══════════════════════════════════════════════════════════");
    println!(
        "{} - {}",
        name,
        snapshot.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!("═══════════════════════════════════════════════════════════");

    for field in Field::all() {
        match snapshot.measurement(field) {
            Some(value) => println!("  {:<16} {}", field.name(), value),
            None => println!("  {:<16} unavailable", field.name()),
        }
    }

    println!();
    println!(
        "  Status: {}    {} of {} fields available",
        snapshot.status_label().as_deref().unwrap_or("unavailable"),
        snapshot.available_count(),
        snapshot.values.len()
    );
    println!();
}
