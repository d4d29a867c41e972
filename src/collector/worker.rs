use super::metrics::InverterMetrics;
use crate::curtailment::Curtailment;
use crate::device::{CommandOutcome, PowerLimit};
use crate::error::{GrowattError, Result};
use crate::inverter::Inverter;
use crate::query::Snapshot;
use crate::transport::Transport;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;

const REQUEST_QUEUE_DEPTH: usize = 16;

/// Control actions accepted by the collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    /// Curtailment limit in percent; applied immediately only while curtailment is on.
    PowerLimit(i64),
    Enable(bool),
    Curtailment(bool),
}

impl fmt::Display for Control {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Control::PowerLimit(percent) => write!(f, "power limit {}%", percent),
            Control::Enable(true) => write!(f, "enable"),
            Control::Enable(false) => write!(f, "disable"),
            Control::Curtailment(true) => write!(f, "curtailment on"),
            Control::Curtailment(false) => write!(f, "curtailment off"),
        }
    }
}

/// `None` when the request only changed local state (a held curtailment limit).
pub type ControlReply = Result<Option<CommandOutcome>>;

struct ControlRequest {
    control: Control,
    reply: oneshot::Sender<ControlReply>,
}

/// Cloneable access to a running [`Worker`].
#[derive(Clone)]
pub struct CollectorHandle {
    requests: mpsc::Sender<ControlRequest>,
    snapshots: watch::Receiver<Option<Snapshot>>,
}

impl CollectorHandle {
    pub fn latest(&self) -> Option<Snapshot> {
        self.snapshots.borrow().clone()
    }

    /// Queue a control action and wait for the worker to carry it out.
    pub async fn send(&self, control: Control) -> ControlReply {
        let (reply, response) = oneshot::channel();
        self.requests
            .send(ControlRequest { control, reply })
            .await
            .map_err(|_| stopped())?;
        response.await.map_err(|_| stopped())?
    }
}

fn stopped() -> GrowattError {
    GrowattError::InvalidOperation("collector is shutting down".into())
}

/// Owns the inverter connection. Polls and control actions are executed
/// one at a time from this task, so they never interleave on the wire.
pub struct Worker<T: Transport> {
    inverter: Inverter<T>,
    curtailment: Curtailment,
    metrics: Arc<InverterMetrics>,
    snapshots: watch::Sender<Option<Snapshot>>,
    requests: mpsc::Receiver<ControlRequest>,
}

impl<T: Transport> Worker<T> {
    pub fn new(inverter: Inverter<T>, metrics: Arc<InverterMetrics>) -> (Self, CollectorHandle) {
        let (request_tx, request_rx) = mpsc::channel(REQUEST_QUEUE_DEPTH);
        let (snapshot_tx, snapshot_rx) = watch::channel(None);

        metrics.set_curtailment(inverter.name(), false);

        let worker = Self {
            inverter,
            curtailment: Curtailment::new(),
            metrics,
            snapshots: snapshot_tx,
            requests: request_rx,
        };
        let handle = CollectorHandle {
            requests: request_tx,
            snapshots: snapshot_rx,
        };
        (worker, handle)
    }

    pub fn curtailment(&self) -> &Curtailment {
        &self.curtailment
    }

    pub async fn poll(&mut self) {
        let snapshot = self.inverter.collect_all().await;
        tracing::debug!(
            "{}: {} fields, status {}",
            self.inverter.name(),
            snapshot.available_count(),
            snapshot.status_label().as_deref().unwrap_or("unavailable")
        );
        self.metrics.update(self.inverter.name(), &snapshot);
        self.snapshots.send_replace(Some(snapshot));
    }

    pub async fn handle(&mut self, control: Control) -> ControlReply {
        let inverter = &mut self.inverter;
        let result = match control {
            Control::PowerLimit(percent) => {
                let limit = PowerLimit::new(percent)?;
                self.curtailment.set_limit(inverter, limit).await
            }
            Control::Enable(enabled) => inverter.set_inverter_enable(enabled).await.map(Some),
            Control::Curtailment(true) => self.curtailment.activate(inverter).await.map(Some),
            Control::Curtailment(false) => self.curtailment.deactivate(inverter).await.map(Some),
        };

        self.metrics
            .set_curtailment(self.inverter.name(), self.curtailment.is_active());
        result
    }

    /// Poll every `poll_interval` and serve control requests in between until
    /// `cancel` fires. The connection is closed on the way out.
    pub async fn run(mut self, poll_interval: Duration, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => self.poll().await,
                Some(request) = self.requests.recv() => {
                    let result = self.handle(request.control).await;
                    let name = self.inverter.name();
                    match &result {
                        Ok(Some(outcome)) if !outcome.is_clean() => {
                            tracing::warn!("{}: {} applied, {}", name, request.control, outcome)
                        }
                        Ok(_) => tracing::info!("{}: {} done", name, request.control),
                        Err(e) => {
                            tracing::error!("{}: {} failed: {}", name, request.control, e)
                        }
                    }
                    if matches!(&result, Ok(Some(outcome)) if outcome.needs_refresh()) {
                        self.poll().await;
                    }
                    request.reply.send(result).ok();
                }
                _ = cancel.cancelled() => {
                    tracing::info!("Poller stopping");
                    break;
                }
            }
        }

        self.inverter.close().await;
    }
}
