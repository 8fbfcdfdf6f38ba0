use crate::core::{ConfigProvider, ExpenseRecord, Pipeline, Storage, TransformResult};
use crate::etl::{aggregator, consolidator, files, importer, scraper, transformer};
use crate::utils::error::Result;
use reqwest::Client;

/// The full ANS expenses pipeline.
///
/// extract: scrape + consolidate. transform: registry join, CNPJ check and
/// aggregation, in memory. load: processed files + database snapshot.
pub struct ExpensePipeline<S: Storage, C: ConfigProvider> {
    storage: S,
    config: C,
    client: Client,
}

impl<S: Storage, C: ConfigProvider> ExpensePipeline<S, C> {
    pub fn new(storage: S, config: C) -> Self {
        Self {
            storage,
            config,
            client: Client::new(),
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    async fn write_outputs(&self, result: &TransformResult) -> Result<()> {
        self.storage
            .write_file(files::ENRICHED_FILE, &files::write_enriched(&result.enriched, false)?)
            .await?;
        self.storage
            .write_file(
                files::INCONSISTENCIES_FILE,
                &files::write_enriched(&result.inconsistencies, true)?,
            )
            .await?;
        self.storage
            .write_file(files::AGGREGATED_FILE, &files::write_aggregates(&result.aggregates)?)
            .await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl<S: Storage, C: ConfigProvider> Pipeline for ExpensePipeline<S, C> {
    async fn extract(&self) -> Result<Vec<ExpenseRecord>> {
        tracing::info!(">>> [1/5] Scraping statements");
        scraper::scrape_statements(&self.client, &self.storage, &self.config).await?;

        tracing::info!(">>> [2/5] Consolidating");
        consolidator::consolidate(&self.storage).await
    }

    async fn transform(&self, data: Vec<ExpenseRecord>) -> Result<TransformResult> {
        tracing::info!(">>> [3/5] Enriching with the operators registry");
        let registry_path =
            transformer::download_registry(&self.client, &self.storage, &self.config).await?;
        let registry =
            transformer::parse_registry(&self.storage.read_file(&registry_path).await?)?;
        let enrichment = transformer::enrich(data, &registry);
        tracing::info!(
            "✅ {} valid CNPJ lines, ❌ {} invalid or unmatched",
            enrichment.valid.len(),
            enrichment.invalid.len()
        );

        tracing::info!(">>> [4/5] Aggregating");
        let aggregates = aggregator::aggregate(&enrichment.valid);

        Ok(TransformResult {
            enriched: enrichment.valid,
            inconsistencies: enrichment.invalid,
            aggregates,
        })
    }

    async fn load(&self, result: TransformResult) -> Result<String> {
        self.write_outputs(&result).await?;

        tracing::info!(">>> [5/5] Loading the database");
        importer::load_data(&self.storage, self.config.full_refresh()).await?;
        Ok(files::DATABASE_FILE.to_string())
    }
}
