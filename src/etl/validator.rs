use crate::core::Storage;
use crate::etl::consolidator::is_expense_description;
use crate::etl::files::{self, Encoding, Table};
use crate::utils::error::{EtlError, Result};
use serde::Serialize;

/// Quality report of the consolidated expenses file.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub total_rows: usize,
    /// Empty cells per column, in header order.
    pub empty_values: Vec<(String, usize)>,
    /// Rows whose description mentions no event/claim term.
    pub unexpected_descriptions: Vec<String>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.unexpected_descriptions.is_empty()
    }
}

pub fn validate_consolidated(bytes: &[u8]) -> Result<ValidationReport> {
    let table = Table::parse(bytes, Encoding::Utf8)?;
    let desc_col = table
        .column("DESCRICAO")
        .ok_or_else(|| EtlError::ValidationError {
            message: "consolidated file has no DESCRICAO column".to_string(),
        })?;

    let mut empty_counts = vec![0usize; table.headers.len()];
    let mut unexpected = Vec::new();

    for row in &table.rows {
        for (i, count) in empty_counts.iter_mut().enumerate() {
            if row.get(i).map_or(true, |v| v.trim().is_empty()) {
                *count += 1;
            }
        }
        let description = row.get(desc_col).unwrap_or_default();
        if !is_expense_description(description) {
            unexpected.push(description.to_string());
        }
    }

    Ok(ValidationReport {
        total_rows: table.rows.len(),
        empty_values: table.headers.iter().cloned().zip(empty_counts).collect(),
        unexpected_descriptions: unexpected,
    })
}

pub async fn validate_output<S: Storage>(storage: &S) -> Result<ValidationReport> {
    tracing::info!("--- 🧐 Validating consolidated expenses ---");
    if !storage.exists(files::CONSOLIDATED_FILE).await {
        return Err(EtlError::ValidationError {
            message: format!("{} not found", files::CONSOLIDATED_FILE),
        });
    }

    let report = validate_consolidated(&storage.read_file(files::CONSOLIDATED_FILE).await?)?;
    tracing::info!("📊 Total rows: {}", report.total_rows);
    for (column, empty) in &report.empty_values {
        tracing::info!("   {}: {} empty", column, empty);
    }
    if report.is_clean() {
        tracing::info!("✅ Every description mentions an event or claim");
    } else {
        tracing::warn!(
            "⚠️ {} rows do not mention EVENTO/SINISTRO explicitly",
            report.unexpected_descriptions.len()
        );
    }
    Ok(report)
}
