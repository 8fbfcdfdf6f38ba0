use crate::core::{EnrichedExpense, OperatorAggregate, Storage};
use crate::etl::files;
use crate::utils::error::{EtlError, Result};
use crate::utils::number::round2;
use std::collections::BTreeMap;

type OperatorKey = (String, String);

/// Sample standard deviation (n - 1). Fewer than two points give 0.0.
pub fn sample_std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    variance.sqrt()
}

/// Sums each operator per quarter, then derives total, quarterly mean and
/// deviation. Sorted by total, largest first.
///
/// Lines without company name, state, year or quarter are left out.
pub fn aggregate(expenses: &[EnrichedExpense]) -> Vec<OperatorAggregate> {
    let mut quarterly: BTreeMap<OperatorKey, BTreeMap<(i32, u32), f64>> = BTreeMap::new();
    let mut skipped = 0usize;

    for e in expenses {
        let (Some(razao_social), Some(uf), Some(ano), Some(trimestre)) = (
            e.razao_social.as_deref(),
            e.uf.as_deref(),
            e.expense.ano,
            e.expense.trimestre,
        ) else {
            skipped += 1;
            continue;
        };
        *quarterly
            .entry((razao_social.to_string(), uf.to_string()))
            .or_default()
            .entry((ano, trimestre))
            .or_insert(0.0) += e.expense.valor_despesas;
    }

    if skipped > 0 {
        tracing::warn!("⚠️ {} lines without operator or period left out of the aggregates", skipped);
    }

    let mut result: Vec<OperatorAggregate> = quarterly
        .into_iter()
        .map(|((razao_social, uf), quarters)| {
            let sums: Vec<f64> = quarters.into_values().collect();
            let total: f64 = sums.iter().sum();
            OperatorAggregate {
                razao_social,
                uf,
                total_despesas: round2(total),
                media_trimestral: round2(total / sums.len() as f64),
                desvio_padrao: round2(sample_std_dev(&sums)),
            }
        })
        .collect();

    result.sort_by(|a, b| b.total_despesas.total_cmp(&a.total_despesas));
    result
}

/// Step 4/5. Aggregates the enriched file (or the given lines) into the
/// per-operator statistics file.
pub async fn run_aggregation<S: Storage>(
    storage: &S,
    enriched: Option<&[EnrichedExpense]>,
) -> Result<Vec<OperatorAggregate>> {
    tracing::info!("--- 📊 Aggregating per operator ---");

    let loaded;
    let enriched = match enriched {
        Some(lines) => lines,
        None => {
            if !storage.exists(files::ENRICHED_FILE).await {
                return Err(EtlError::processing(format!(
                    "{} not found, run the transform step first",
                    files::ENRICHED_FILE
                )));
            }
            loaded = files::read_enriched(&storage.read_file(files::ENRICHED_FILE).await?)?;
            &loaded[..]
        }
    };

    let aggregates = aggregate(enriched);
    storage
        .write_file(files::AGGREGATED_FILE, &files::write_aggregates(&aggregates)?)
        .await?;

    tracing::info!("✅ {} operators aggregated into {}", aggregates.len(), files::AGGREGATED_FILE);
    for top in aggregates.iter().take(3) {
        tracing::info!("🏆 {} ({}): {:.2}", top.razao_social, top.uf, top.total_despesas);
    }
    Ok(aggregates)
}
