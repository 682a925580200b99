use prometheus::{
    Encoder, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub broadcasts_total: IntCounterVec,
    pub broadcast_latency_seconds: HistogramVec,
    pub accepts_total: IntCounterVec,
    pub otp_verifications_total: IntCounterVec,
    pub notifications_total: IntCounterVec,
    pub shop_orders_in_queue: IntGauge,
    pub live_connections: IntGauge,
    pub location_updates_total: IntCounter,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let broadcasts_total = IntCounterVec::new(
            Opts::new("broadcasts_total", "Total assignment broadcasts by outcome"),
            &["outcome"],
        )
        .expect("valid broadcasts_total metric");

        let broadcast_latency_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "broadcast_latency_seconds",
                "Latency of broadcast processing in seconds",
            ),
            &["outcome"],
        )
        .expect("valid broadcast_latency_seconds metric");

        let accepts_total = IntCounterVec::new(
            Opts::new("accepts_total", "Total assignment accept attempts by outcome"),
            &["outcome"],
        )
        .expect("valid accepts_total metric");

        let otp_verifications_total = IntCounterVec::new(
            Opts::new("otp_verifications_total", "Total handover code checks by result"),
            &["result"],
        )
        .expect("valid otp_verifications_total metric");

        let notifications_total = IntCounterVec::new(
            Opts::new("notifications_total", "Total availability mails by result"),
            &["result"],
        )
        .expect("valid notifications_total metric");

        let shop_orders_in_queue =
            IntGauge::new("shop_orders_in_queue", "Current number of shop orders awaiting broadcast")
                .expect("valid shop_orders_in_queue metric");

        let live_connections = IntGauge::new("live_connections", "Currently open live sockets")
            .expect("valid live_connections metric");

        let location_updates_total =
            IntCounter::new("location_updates_total", "Total accepted location samples")
                .expect("valid location_updates_total metric");

        registry
            .register(Box::new(broadcasts_total.clone()))
            .expect("register broadcasts_total");
        registry
            .register(Box::new(broadcast_latency_seconds.clone()))
            .expect("register broadcast_latency_seconds");
        registry
            .register(Box::new(accepts_total.clone()))
            .expect("register accepts_total");
        registry
            .register(Box::new(otp_verifications_total.clone()))
            .expect("register otp_verifications_total");
        registry
            .register(Box::new(notifications_total.clone()))
            .expect("register notifications_total");
        registry
            .register(Box::new(shop_orders_in_queue.clone()))
            .expect("register shop_orders_in_queue");
        registry
            .register(Box::new(live_connections.clone()))
            .expect("register live_connections");
        registry
            .register(Box::new(location_updates_total.clone()))
            .expect("register location_updates_total");

        Self {
            registry,
            broadcasts_total,
            broadcast_latency_seconds,
            accepts_total,
            otp_verifications_total,
            notifications_total,
            shop_orders_in_queue,
            live_connections,
            location_updates_total,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}
