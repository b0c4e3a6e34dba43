//! Recorder installation.

use {anyhow::Result, tracing::info};

/// Renders whatever the installed recorder has collected.
#[derive(Clone)]
pub struct MetricsHandle {
    #[cfg(feature = "prometheus")]
    prometheus_handle: metrics_exporter_prometheus::PrometheusHandle,
}

impl MetricsHandle {
    /// Current metrics in Prometheus text format. Empty without the
    /// `prometheus` feature.
    #[must_use]
    pub fn render(&self) -> String {
        #[cfg(feature = "prometheus")]
        {
            self.prometheus_handle.render()
        }
        #[cfg(not(feature = "prometheus"))]
        {
            String::new()
        }
    }
}

/// Install the process-wide recorder. Call once at startup.
///
/// # Errors
///
/// Fails when the bucket configuration is rejected or a recorder is already
/// installed.
pub fn init_metrics() -> Result<MetricsHandle> {
    #[cfg(feature = "prometheus")]
    {
        let prometheus_handle = builder()?.install_recorder()?;
        info!("prometheus metrics recorder installed");
        Ok(MetricsHandle { prometheus_handle })
    }

    #[cfg(not(feature = "prometheus"))]
    {
        info!("metrics export not compiled in");
        Ok(MetricsHandle {})
    }
}

/// A recorder that is not installed globally, for scoped use with
/// `metrics::set_default_local_recorder`.
#[cfg(feature = "prometheus")]
pub fn build_recorder() -> Result<metrics_exporter_prometheus::PrometheusRecorder> {
    Ok(builder()?.build_recorder())
}

#[cfg(feature = "prometheus")]
fn builder() -> Result<metrics_exporter_prometheus::PrometheusBuilder> {
    use {
        crate::buckets,
        metrics_exporter_prometheus::{Matcher, PrometheusBuilder},
    };

    Ok(PrometheusBuilder::new().set_buckets_for_metric(
        Matcher::Suffix("_duration_seconds".to_string()),
        buckets::DURATION_SECONDS,
    )?)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(all(test, feature = "prometheus"))]
mod tests {
    use {
        super::*,
        crate::{dispatch, labels},
    };

    #[test]
    fn local_recorder_renders_counters_and_buckets() {
        let recorder = build_recorder().unwrap();
        let handle = recorder.handle();
        metrics::with_local_recorder(&recorder, || {
            metrics::counter!(dispatch::ROUTES_TOTAL, labels::ROUTE => "keyword").increment(2);
            metrics::histogram!(dispatch::DURATION_SECONDS).record(0.02);
        });

        let rendered = handle.render();
        assert!(rendered.contains(r#"keyflow_dispatch_routes_total{route="keyword"} 2"#));
        assert!(
            rendered
                .lines()
                .any(|l| l.starts_with(r#"keyflow_dispatch_duration_seconds_bucket{le="0.025"}"#)),
            "{rendered}"
        );
    }
}
