//! Metric declarations for the ticksim simulator.
//!
//! Each metric the queue, scheduler and dispatcher record has one const
//! [`Metric`] in [`metric_defs`]. Recording sites use `metric.name` with the
//! `metrics` macros; nothing else spells the string.
//!
//! Without an installed recorder the `metrics` macros do nothing, so the
//! library records unconditionally and the binary decides whether anything
//! listens.
//!
//! # Example
//!
//! ```rust
//! use ticksim_metrics::{metric_defs, MetricKind};
//!
//! let depth = &metric_defs::QUEUE_DEPTH;
//! assert_eq!(depth.kind, MetricKind::Gauge);
//! metrics::gauge!(depth.name).set(3.0);
//! ```

pub use metrics;

use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};

/// How a metric is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// Only ever incremented.
    Counter,
    /// Set to the latest value.
    Gauge,
    /// One sample per observation.
    Histogram,
}

impl MetricKind {
    /// Lowercase name, as used in exports.
    pub const fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Histogram => "histogram",
        }
    }
}

/// Name, kind and metadata of one metric.
#[derive(Debug, Clone)]
pub struct Metric {
    /// Dotted name, always prefixed `ticksim.`.
    pub name: &'static str,
    /// Recording style.
    pub kind: MetricKind,
    /// Text passed to the recorder's describe call.
    pub description: &'static str,
    /// Unit of the recorded values.
    pub unit: Unit,
    /// Label keys attached at the recording site.
    pub labels: &'static [&'static str],
}

impl Metric {
    const fn new(kind: MetricKind, name: &'static str, description: &'static str) -> Self {
        Metric {
            name,
            kind,
            description,
            unit: Unit::Count,
            labels: &[],
        }
    }

    /// Declare a counter.
    pub const fn counter(name: &'static str, description: &'static str) -> Self {
        Self::new(MetricKind::Counter, name, description)
    }

    /// Declare a gauge.
    pub const fn gauge(name: &'static str, description: &'static str) -> Self {
        Self::new(MetricKind::Gauge, name, description)
    }

    /// Declare a histogram.
    pub const fn histogram(name: &'static str, description: &'static str) -> Self {
        Self::new(MetricKind::Histogram, name, description)
    }

    /// Override the unit (counts by default).
    pub const fn in_unit(mut self, unit: Unit) -> Self {
        self.unit = unit;
        self
    }

    /// Label keys the recording site attaches.
    pub const fn labelled(mut self, labels: &'static [&'static str]) -> Self {
        self.labels = labels;
        self
    }

    /// Register unit and description with the installed recorder.
    pub fn describe(&self) {
        let Metric {
            name,
            unit,
            description,
            ..
        } = *self;
        match self.kind {
            MetricKind::Counter => describe_counter!(name, unit, description),
            MetricKind::Gauge => describe_gauge!(name, unit, description),
            MetricKind::Histogram => describe_histogram!(name, unit, description),
        }
    }
}

/// Every metric the simulator records.
pub mod metric_defs {
    use super::{Metric, Unit};

    // Message queue

    /// Labels: kind
    pub const QUEUE_ENQUEUED: Metric =
        Metric::counter("ticksim.queue.enqueued", "Messages accepted into the message queue")
            .labelled(&["kind"]);

    pub const QUEUE_REJECTED: Metric = Metric::counter(
        "ticksim.queue.rejected",
        "Messages refused because the message queue was full",
    );

    pub const QUEUE_DEPTH: Metric =
        Metric::gauge("ticksim.queue.depth", "Messages waiting in the message queue");

    // Tick scheduler

    pub const SCHEDULER_TICKS: Metric =
        Metric::counter("ticksim.scheduler.ticks", "Ticks advanced by the scheduler");

    /// Labels: kind
    pub const SCHEDULER_DELIVERED: Metric = Metric::counter(
        "ticksim.scheduler.delivered",
        "Messages whose handler returned normally",
    )
    .labelled(&["kind"]);

    pub const SCHEDULER_HANDLER_PANICS: Metric = Metric::counter(
        "ticksim.scheduler.handler_panics",
        "Message handlers that panicked during delivery",
    );

    pub const DISPATCH_HANDLER_TIME: Metric = Metric::histogram(
        "ticksim.dispatch.handler_time_us",
        "Wall-clock time spent in one message handler",
    )
    .in_unit(Unit::Microseconds);

    // Node registry

    /// Labels: reason (`not_alive`, `inbox_full`, `no_destination`, `unknown_node`)
    pub const NODE_REJECTED: Metric = Metric::counter(
        "ticksim.node.rejected",
        "Delivered messages the registry refused to apply",
    )
    .labelled(&["reason"]);

    pub const ALL: &[&Metric] = &[
        &QUEUE_ENQUEUED,
        &QUEUE_REJECTED,
        &QUEUE_DEPTH,
        &SCHEDULER_TICKS,
        &SCHEDULER_DELIVERED,
        &SCHEDULER_HANDLER_PANICS,
        &DISPATCH_HANDLER_TIME,
        &NODE_REJECTED,
    ];
}

/// Describe every metric in [`metric_defs::ALL`] to the current recorder.
pub fn describe_metrics() {
    for metric in metric_defs::ALL {
        metric.describe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_definitions() {
        assert_eq!(metric_defs::QUEUE_ENQUEUED.name, "ticksim.queue.enqueued");
        assert_eq!(metric_defs::QUEUE_ENQUEUED.labels, &["kind"]);
        assert_eq!(metric_defs::QUEUE_DEPTH.kind, MetricKind::Gauge);
        assert_eq!(metric_defs::QUEUE_DEPTH.unit, Unit::Count);
        assert_eq!(metric_defs::DISPATCH_HANDLER_TIME.kind, MetricKind::Histogram);
        assert_eq!(metric_defs::DISPATCH_HANDLER_TIME.unit, Unit::Microseconds);
        assert_eq!(metric_defs::NODE_REJECTED.labels, &["reason"]);
    }

    #[test]
    fn test_metric_names_unique_and_prefixed() {
        let mut names: Vec<&str> = metric_defs::ALL.iter().map(|m| m.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), metric_defs::ALL.len());
        assert!(names.iter().all(|n| n.starts_with("ticksim.")));
        assert!(metric_defs::ALL.iter().all(|m| !m.description.is_empty()));
    }

    #[test]
    fn test_describe_without_recorder() {
        describe_metrics();
        assert_eq!(MetricKind::Histogram.as_str(), "histogram");
    }
}
