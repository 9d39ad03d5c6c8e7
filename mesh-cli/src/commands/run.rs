//! Run the full pipeline.

use anyhow::Result;
use bgpmesh_fleet::{Config, FleetContext, Pipeline, ResultCollector};
use bgpmesh_types::TestMetric;

/// Run every stage and print the outcome.
pub async fn run(config: Config) -> Result<()> {
    let ctx = FleetContext::from_config(config).await;
    let mut pipeline = Pipeline::new(ctx);

    match pipeline.run().await {
        Ok(summary) => {
            println!("=== bgp-mesh run ===");
            println!();
            println!("Routers:    {}", summary.router_count);
            println!("Configured: {}", summary.configure.succeeded_count());
            println!("Injected:   {}", summary.inject.succeeded_count());
            println!();
            print_metrics(pipeline.collector());
            println!();
            println!("Report: {}", summary.report_location);
            Ok(())
        }
        Err(e) => {
            if !pipeline.collector().metrics().is_empty() {
                print_metrics(pipeline.collector());
            }
            Err(e.into())
        }
    }
}

fn print_metrics(collector: &ResultCollector) {
    println!("Performance:");
    for metric in collector.metrics() {
        println!("{}", metric_line(metric));
    }
}

fn metric_line(metric: &TestMetric) -> String {
    match &metric.detail {
        Some(detail) => format!("  [{}] {:<26} {detail}", metric.status, metric.name),
        None => format!("  [{}] {}", metric.status, metric.name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metric(json: &str) -> TestMetric {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn metric_line_shows_status_and_detail() {
        let failed = metric(
            r#"{"test_name": "cpu_utilization", "status": "FAIL", "duration": 1.5,
                "details": {"avg_cpu": 99.0}, "timestamp": "2026-01-01T00:00:00Z",
                "detail": "avg_cpu 99 above ceiling 80"}"#,
        );
        assert_eq!(
            metric_line(&failed),
            "  [FAIL] cpu_utilization            avg_cpu 99 above ceiling 80"
        );

        let passed = metric(
            r#"{"test_name": "bgp_convergence", "status": "PASS", "duration": 0.2,
                "details": {"convergence_time": 2.5}, "timestamp": "2026-01-01T00:00:00Z"}"#,
        );
        assert_eq!(metric_line(&passed), "  [PASS] bgp_convergence");
    }
}
