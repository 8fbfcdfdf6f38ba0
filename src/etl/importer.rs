use crate::core::Storage;
use crate::db::ExpenseDatabase;
use crate::etl::files;
use crate::utils::error::Result;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub operators: usize,
    pub detailed_expenses: usize,
    pub aggregates: usize,
}

/// Step 5/5. Loads the enriched and aggregated files into the database
/// snapshot at `files::DATABASE_FILE`.
///
/// `full_refresh` empties every table first; otherwise rows are appended to
/// the existing snapshot. Missing input files are skipped.
pub async fn load_data<S: Storage>(storage: &S, full_refresh: bool) -> Result<ImportSummary> {
    tracing::info!("--- 🐘 Loading database (full refresh: {}) ---", full_refresh);

    let mut db = ExpenseDatabase::load_or_default(storage, files::DATABASE_FILE).await?;
    if full_refresh {
        tracing::info!("🧹 Truncating tables");
        db.truncate();
    }

    let mut summary = ImportSummary::default();

    if storage.exists(files::ENRICHED_FILE).await {
        tracing::info!("📥 Loading detailed expenses");
        let lines = files::read_enriched(&storage.read_file(files::ENRICHED_FILE).await?)?;
        summary.operators = db.insert_operators(&lines);
        summary.detailed_expenses = db.insert_expenses(&lines);
    } else {
        tracing::warn!("⚠️ {} not found, detailed expenses skipped", files::ENRICHED_FILE);
    }

    if storage.exists(files::AGGREGATED_FILE).await {
        tracing::info!("📥 Loading aggregated expenses");
        let aggregates =
            files::read_aggregates(&storage.read_file(files::AGGREGATED_FILE).await?)?;
        summary.aggregates = db.insert_aggregates(&aggregates);
    } else {
        tracing::warn!("⚠️ {} not found, aggregates skipped", files::AGGREGATED_FILE);
    }

    db.save(storage, files::DATABASE_FILE).await?;
    tracing::info!(
        "🏁 Load finished: {} operators, {} expenses, {} aggregates",
        summary.operators,
        summary.detailed_expenses,
        summary.aggregates
    );
    Ok(summary)
}
