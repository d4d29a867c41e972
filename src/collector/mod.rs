pub mod metrics;
pub mod server;
pub mod worker;

pub use metrics::InverterMetrics;
pub use server::ApiServer;
pub use worker::{CollectorHandle, Control, ControlReply, Worker};
