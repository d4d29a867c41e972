use crate::device::{CommandOutcome, InverterCommand, PowerLimit};
use crate::error::Result;
use crate::inverter::Inverter;
use crate::transport::Transport;

/// Export curtailment switch.
///
/// While inactive the inverter runs at full power and a new limit is only
/// remembered. Activating applies the remembered limit; deactivating writes
/// 100% back. The active flag follows the device: it only flips once the
/// limit write landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Curtailment {
    active: bool,
    pending_limit: PowerLimit,
}

impl Curtailment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn pending_limit(&self) -> PowerLimit {
        self.pending_limit
    }

    /// Limit the inverter should currently be running at.
    pub fn effective_limit(&self) -> PowerLimit {
        if self.active {
            self.pending_limit
        } else {
            PowerLimit::FULL
        }
    }

    /// Remember `limit`, and apply it right away if curtailment is on.
    pub async fn set_limit<T: Transport>(
        &mut self,
        inverter: &mut Inverter<T>,
        limit: PowerLimit,
    ) -> Result<Option<CommandOutcome>> {
        self.pending_limit = limit;
        if !self.active {
            tracing::debug!("Curtailment off, holding {} for later", limit);
            return Ok(None);
        }
        inverter
            .execute(InverterCommand::SetPowerLimit(limit))
            .await
            .map(Some)
    }

    pub async fn activate<T: Transport>(
        &mut self,
        inverter: &mut Inverter<T>,
    ) -> Result<CommandOutcome> {
        let outcome = inverter
            .execute(InverterCommand::SetPowerLimit(self.pending_limit))
            .await?;
        self.active = true;
        tracing::info!("Curtailment on at {}", self.pending_limit);
        Ok(outcome)
    }

    pub async fn deactivate<T: Transport>(
        &mut self,
        inverter: &mut Inverter<T>,
    ) -> Result<CommandOutcome> {
        let outcome = inverter
            .execute(InverterCommand::SetPowerLimit(PowerLimit::FULL))
            .await?;
        self.active = false;
        tracing::info!("Curtailment off");
        Ok(outcome)
    }
}
