//! Prometheus metrics exposed at `/metrics`.

use std::sync::Arc;

use domains::{EventPublisher, FanoutEvent};
use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;

#[derive(Debug, Clone, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct CommandLabels {
    pub operation: String,
    pub outcome: String,
}

#[derive(Debug, Clone, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct EventLabels {
    pub event: String,
}

#[derive(Clone)]
pub struct Metrics {
    registry: Arc<Registry>,
    pub commands: Family<CommandLabels, Counter>,
    pub fanout_events: Family<EventLabels, Counter>,
    pub ws_subscribers: Gauge,
    pub lag_recoveries: Counter,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let mut registry = Registry::with_prefix("prastha");
        let commands = Family::<CommandLabels, Counter>::default();
        let fanout_events = Family::<EventLabels, Counter>::default();
        let ws_subscribers = Gauge::default();
        let lag_recoveries = Counter::default();

        registry.register("commands", "HTTP commands handled, by route and outcome", commands.clone());
        registry.register("fanout_events", "Fan-out events published", fanout_events.clone());
        registry.register("ws_subscribers", "Connected WebSocket subscribers", ws_subscribers.clone());
        registry.register(
            "ws_lag_recoveries",
            "Times a lagging subscriber was told to re-fetch",
            lag_recoveries.clone(),
        );

        Self {
            registry: Arc::new(registry),
            commands,
            fanout_events,
            ws_subscribers,
            lag_recoveries,
        }
    }

    pub fn record_command(&self, operation: impl Into<String>, outcome: &str) {
        self.commands
            .get_or_create(&CommandLabels {
                operation: operation.into(),
                outcome: outcome.to_string(),
            })
            .inc();
    }

    /// OpenMetrics text exposition.
    pub fn render(&self) -> Result<String, std::fmt::Error> {
        let mut out = String::new();
        encode(&mut out, &self.registry)?;
        Ok(out)
    }
}

fn event_name(event: &FanoutEvent) -> &'static str {
    match event {
        FanoutEvent::RefreshThreads => "refresh-threads",
        FanoutEvent::NewMessage { .. } => "new-message",
        FanoutEvent::RefreshGossips => "refresh-gossips",
    }
}

/// Counts events before handing them to the inner publisher.
pub struct MeteredPublisher<P> {
    inner: P,
    metrics: Metrics,
}

impl<P> MeteredPublisher<P> {
    pub fn new(inner: P, metrics: Metrics) -> Self {
        Self { inner, metrics }
    }
}

impl<P: EventPublisher> EventPublisher for MeteredPublisher<P> {
    fn publish(&self, event: FanoutEvent) {
        self.metrics
            .fanout_events
            .get_or_create(&EventLabels {
                event: event_name(&event).to_string(),
            })
            .inc();
        self.inner.publish(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domains::MockEventPublisher;

    #[test]
    fn rendered_output_contains_registered_series() {
        let metrics = Metrics::new();
        metrics.record_command("POST /api/threads", "ok");
        metrics.ws_subscribers.inc();

        let text = metrics.render().unwrap();
        assert!(text.contains("prastha_commands_total{operation=\"POST /api/threads\",outcome=\"ok\"} 1"));
        assert!(text.contains("prastha_ws_subscribers 1"));
    }

    #[test]
    fn metered_publisher_counts_then_forwards() {
        let mut inner = MockEventPublisher::new();
        inner
            .expect_publish()
            .withf(|event| *event == FanoutEvent::RefreshGossips)
            .times(2)
            .return_const(());
        let metrics = Metrics::new();
        let publisher = MeteredPublisher::new(inner, metrics.clone());

        publisher.publish(FanoutEvent::RefreshGossips);
        publisher.publish(FanoutEvent::RefreshGossips);

        let count = metrics
            .fanout_events
            .get_or_create(&EventLabels {
                event: "refresh-gossips".into(),
            })
            .get();
        assert_eq!(count, 2);
    }
}
