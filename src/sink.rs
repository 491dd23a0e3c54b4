use crate::models::metric::Metric;
use std::borrow::Cow;
use std::io::{self, Write};

/// Receives the metrics of a collection cycle.
pub trait MetricSink {
    fn publish(&mut self, metric: &Metric) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl MetricSink for Vec<Metric> {
    fn publish(&mut self, metric: &Metric) -> io::Result<()> {
        self.push(metric.clone());
        Ok(())
    }
}

/// Writes Graphite plaintext lines: `<prefix>.<name> <value> <unix-seconds>`.
pub struct LineSink<W: Write> {
    out:       W,
    prefix:    String,
    timestamp: i64,
}

impl<W: Write> LineSink<W> {
    /// Every line is stamped with `timestamp` so one cycle's metrics align.
    pub fn new(out: W, prefix: impl Into<String>, timestamp: i64) -> Self {
        Self { out, prefix: prefix.into(), timestamp }
    }
}

impl<W: Write> MetricSink for LineSink<W> {
    fn publish(&mut self, metric: &Metric) -> io::Result<()> {
        let name = plaintext_name(&metric.name);
        if self.prefix.is_empty() {
            writeln!(self.out, "{} {} {}", name, metric.value, self.timestamp)
        } else {
            writeln!(self.out, "{}.{} {} {}", self.prefix, name, metric.value, self.timestamp)
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

// The plaintext protocol splits on whitespace; a mount point may contain it.
fn plaintext_name(name: &str) -> Cow<'_, str> {
    if name.contains(char::is_whitespace) {
        Cow::Owned(name.replace(char::is_whitespace, "_"))
    } else {
        Cow::Borrowed(name)
    }
}
