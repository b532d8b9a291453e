use prometheus::{
    Encoder, Histogram, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub transitions_total: IntCounterVec,
    pub leases_expired_total: IntCounter,
    pub open_pool_size: IntGauge,
    pub lease_sweep_seconds: Histogram,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let transitions_total = IntCounterVec::new(
            Opts::new(
                "transitions_total",
                "Assignment transitions by operation and outcome",
            ),
            &["op", "outcome"],
        )
        .expect("valid transitions_total metric");

        let leases_expired_total = IntCounter::new(
            "leases_expired_total",
            "Claims expired by the lease sweeper",
        )
        .expect("valid leases_expired_total metric");

        let open_pool_size = IntGauge::new(
            "open_pool_size",
            "Requests currently claimable by any collector",
        )
        .expect("valid open_pool_size metric");

        let lease_sweep_seconds = Histogram::with_opts(prometheus::HistogramOpts::new(
            "lease_sweep_seconds",
            "Duration of one lease sweep pass in seconds",
        ))
        .expect("valid lease_sweep_seconds metric");

        registry
            .register(Box::new(transitions_total.clone()))
            .expect("register transitions_total");
        registry
            .register(Box::new(leases_expired_total.clone()))
            .expect("register leases_expired_total");
        registry
            .register(Box::new(open_pool_size.clone()))
            .expect("register open_pool_size");
        registry
            .register(Box::new(lease_sweep_seconds.clone()))
            .expect("register lease_sweep_seconds");

        Self {
            registry,
            transitions_total,
            leases_expired_total,
            open_pool_size,
            lease_sweep_seconds,
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
