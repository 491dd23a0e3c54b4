use serde::{Serialize, Serializer};
use std::fmt;

/// A numeric metric value as handed to the publisher.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    /// Unit-converted space figure, already rounded to `precision` decimals.
    Gauge { value: f64, precision: u32 },
    /// Raw counter emitted as an integer (inode counts).
    Count(u64),
}

impl Serialize for MetricValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match *self {
            MetricValue::Gauge { value, .. } => serializer.serialize_f64(value),
            MetricValue::Count(n)            => serializer.serialize_u64(n),
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            MetricValue::Gauge { value, precision } => write!(f, "{:.*}", precision as usize, value),
            MetricValue::Count(n)                   => write!(f, "{}", n),
        }
    }
}

/// A named measurement, e.g. `var.log.gigabyte_used = 12.5`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metric {
    pub name:  String,
    pub value: MetricValue,
}

impl Metric {
    pub fn gauge(name: impl Into<String>, value: f64, precision: u32) -> Self {
        Self { name: name.into(), value: MetricValue::Gauge { value, precision } }
    }

    pub fn count(name: impl Into<String>, value: u64) -> Self {
        Self { name: name.into(), value: MetricValue::Count(value) }
    }
}
