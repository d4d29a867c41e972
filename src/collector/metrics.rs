use crate::query::Snapshot;
use crate::registers::Field;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;
use std::sync::atomic::AtomicU64;

type FloatGauge = Family<InverterLabels, Gauge<f64, AtomicU64>>;

fn bool_to_f64(b: bool) -> f64 {
    if b { 1.0 } else { 0.0 }
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct InverterLabels {
    pub inverter: String,
}

/// Prometheus gauges for one or more inverters, keyed by inverter name.
///
/// Each snapshot field gets its own gauge family. A field that was
/// unavailable in the latest snapshot is removed from its family so stale
/// readings are never exported.
pub struct InverterMetrics {
    fields: Vec<(Field, FloatGauge)>,
    running: FloatGauge,
    unavailable_fields: FloatGauge,
    curtailment_active: FloatGauge,
}

impl Default for InverterMetrics {
    fn default() -> Self {
        Self {
            fields: Field::all().map(|field| (field, FloatGauge::default())).collect(),
            running: FloatGauge::default(),
            unavailable_fields: FloatGauge::default(),
            curtailment_active: FloatGauge::default(),
        }
    }
}

impl InverterMetrics {
    pub fn register(&self, registry: &mut Registry) {
        for (field, family) in &self.fields {
            let unit = field.unit().symbol();
            let help = if unit.is_empty() {
                format!("Inverter {}", field.name())
            } else {
                format!("Inverter {} in {}", field.name(), unit)
            };
            registry.register(format!("growatt_{}", field.name()), help, family.clone());
        }
        registry.register(
            "growatt_inverter_running",
            "Inverter reports normal operation (1=yes, 0=no)",
            self.running.clone(),
        );
        registry.register(
            "growatt_unavailable_fields",
            "Number of fields that could not be read in the last poll",
            self.unavailable_fields.clone(),
        );
        registry.register(
            "growatt_curtailment_active",
            "Export curtailment state (1=on, 0=off)",
            self.curtailment_active.clone(),
        );
    }

    pub fn update(&self, inverter: &str, snapshot: &Snapshot) {
        let labels = InverterLabels {
            inverter: inverter.to_string(),
        };

        for (field, family) in &self.fields {
            match snapshot.get(*field) {
                Some(value) => {
                    family.get_or_create(&labels).set(value);
                }
                None => {
                    family.remove(&labels);
                }
            }
        }

        match snapshot.inverter_running() {
            Some(running) => {
                self.running.get_or_create(&labels).set(bool_to_f64(running));
            }
            None => {
                self.running.remove(&labels);
            }
        }

        self.unavailable_fields
            .get_or_create(&labels)
            .set(snapshot.unavailable_count() as f64);
    }

    pub fn set_curtailment(&self, inverter: &str, active: bool) {
        let labels = InverterLabels {
            inverter: inverter.to_string(),
        };
        self.curtailment_active
            .get_or_create(&labels)
            .set(bool_to_f64(active));
    }
}
