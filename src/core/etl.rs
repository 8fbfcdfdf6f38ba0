use crate::core::Pipeline;
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;

pub struct EtlEngine<P: Pipeline> {
    pipeline: P,
    monitor: SystemMonitor,
}

impl<P: Pipeline> EtlEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    pub fn monitor(&self) -> &SystemMonitor {
        &self.monitor
    }

    /// Runs extract, transform and load. The first failing phase aborts the run.
    pub async fn run(&self) -> Result<String> {
        tracing::info!("🚀 Starting ANS expenses pipeline");

        let raw_data = self.pipeline.extract().await?;
        tracing::info!("Extracted {} expense lines", raw_data.len());
        self.monitor.record_phase("extract");

        let transformed = self.pipeline.transform(raw_data).await?;
        tracing::info!(
            "Transformed: {} enriched, {} inconsistent, {} operators aggregated",
            transformed.enriched.len(),
            transformed.inconsistencies.len(),
            transformed.aggregates.len()
        );
        self.monitor.record_phase("transform");

        let output_path = self.pipeline.load(transformed).await?;
        tracing::info!("Database snapshot saved to: {}", output_path);
        self.monitor.record_phase("load");
        self.monitor.log_final_stats();

        Ok(output_path)
    }
}
