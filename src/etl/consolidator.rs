use crate::core::{ExpenseRecord, Storage};
use crate::etl::files::{self, cell, Encoding, Table};
use crate::utils::error::{EtlError, Result};
use crate::utils::number::parse_br_strict;
use chrono::{Datelike, NaiveDate};
use std::io::{Cursor, Read};
use zip::ZipArchive;

/// Description terms marking "event/claim" (assistance) expenses.
pub const EXPENSE_TERMS: [&str; 2] = ["EVENTO", "SINISTRO"];

const REQUIRED_COLUMNS: [&str; 4] = ["DATA", "REG_ANS", "DESCRICAO", "VL_SALDO_FINAL"];

pub fn is_expense_description(description: &str) -> bool {
    let upper = description.to_uppercase();
    EXPENSE_TERMS.iter().any(|term| upper.contains(term))
}

/// Accepts `2024-03-31`, `2024-03-31 00:00:00` and `31/03/2024`.
pub fn parse_statement_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let date_part = raw.split_whitespace().next().unwrap_or(raw);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(date_part, "%d/%m/%Y"))
        .ok()
}

pub fn quarter_of(date: NaiveDate) -> u32 {
    (date.month() - 1) / 3 + 1
}

/// Filters one statement table. `None` when the layout lacks the required
/// columns or no row is an event/claim expense.
pub fn extract_expenses(bytes: &[u8]) -> Result<Option<Vec<ExpenseRecord>>> {
    let table = Table::parse(bytes, Encoding::Latin1)?;
    if !table.has_columns(&REQUIRED_COLUMNS) {
        return Ok(None);
    }

    let date_col = table.column("DATA");
    let reg_col = table.column("REG_ANS");
    let desc_col = table.column("DESCRICAO");
    let value_col = table.column("VL_SALDO_FINAL");

    let records: Vec<ExpenseRecord> = table
        .rows
        .iter()
        .filter_map(|row| {
            let descricao = cell(row, desc_col)?;
            if !is_expense_description(descricao) {
                return None;
            }
            let date = cell(row, date_col).and_then(parse_statement_date);
            Some(ExpenseRecord {
                registro_ans: cell(row, reg_col).unwrap_or_default().to_string(),
                ano: date.map(|d| d.year()),
                trimestre: date.map(quarter_of),
                descricao: descricao.to_string(),
                valor_despesas: cell(row, value_col)
                    .and_then(parse_br_strict)
                    .unwrap_or(0.0),
            })
        })
        .collect();

    Ok((!records.is_empty()).then_some(records))
}

/// Reads every csv/txt entry of a statements archive.
pub fn expenses_from_archive(bytes: &[u8]) -> Result<Vec<ExpenseRecord>> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut all = Vec::new();

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        let ext = name.rsplit('.').next().unwrap_or_default().to_lowercase();

        match ext.as_str() {
            "csv" | "txt" => {}
            "xlsx" | "xls" => {
                tracing::warn!("   ⚠️ Spreadsheet entry not supported, skipped: {}", name);
                continue;
            }
            _ => continue,
        }

        tracing::info!("   📄 Reading: {}", name);
        let mut content = Vec::new();
        entry.read_to_end(&mut content)?;

        match extract_expenses(&content) {
            Ok(Some(records)) => {
                tracing::info!("      ✅ Extracted {} rows", records.len());
                all.extend(records);
            }
            Ok(None) => tracing::info!("      ⚠️ Ignored (no expected columns or no expense rows)"),
            Err(e) => tracing::warn!("   ❌ Could not parse {}: {}", name, e),
        }
    }

    Ok(all)
}

/// Step 2/5. Consolidates the archives in `raw/` into the consolidated expenses file.
pub async fn consolidate<S: Storage>(storage: &S) -> Result<Vec<ExpenseRecord>> {
    tracing::info!("--- 🚀 Consolidating statements ---");
    let mut all = Vec::new();

    for name in storage.list_files(files::RAW_DIR).await? {
        if !name.to_lowercase().ends_with(".zip") {
            continue;
        }
        tracing::info!("📦 Processing: {}", name);
        let bytes = storage.read_file(&files::raw_path(&name)).await?;
        match expenses_from_archive(&bytes) {
            Ok(records) => all.extend(records),
            Err(e) => tracing::error!("❌ Broken archive {}: {}", name, e),
        }
    }

    if all.is_empty() {
        return Err(EtlError::processing(
            "no expense rows could be consolidated from raw/",
        ));
    }

    storage
        .write_file(files::CONSOLIDATED_FILE, &files::write_expenses(&all)?)
        .await?;
    tracing::info!(
        "✅ Wrote {} ({} rows). CNPJ and company name are joined in the next step",
        files::CONSOLIDATED_FILE,
        all.len()
    );
    Ok(all)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expense_terms_case_insensitive() {
        assert!(is_expense_description("Eventos indenizáveis líquidos"));
        assert!(is_expense_description("SINISTROS RETIDOS"));
        assert!(!is_expense_description("RECEITAS DE CONTRAPRESTAÇÕES"));
    }

    #[test]
    fn test_statement_dates() {
        let d = parse_statement_date("2024-08-15").unwrap();
        assert_eq!((d.year(), quarter_of(d)), (2024, 3));
        let d = parse_statement_date("31/12/2023").unwrap();
        assert_eq!((d.year(), quarter_of(d)), (2023, 4));
        let d = parse_statement_date("2024-01-01 00:00:00").unwrap();
        assert_eq!(quarter_of(d), 1);
        assert!(parse_statement_date("ontem").is_none());
    }

    #[test]
    fn test_extract_filters_latin1_rows() {
        let data = b"\"DATA\";\"REG_ANS\";\"CD_CONTA_CONTABIL\";\"DESCRICAO\";\"VL_SALDO_INICIAL\";\"VL_SALDO_FINAL\"\n\
2024-01-01;316458;41;EVENTOS INDENIZ\xc1VEIS;0;1.234,56\n\
2024-01-01;316458;31;CONTRAPRESTA\xc7\xd5ES;0;99,00\n\
2024-04-01;419761;41;Sinistros conhecidos;0;10,5\n";
        let records = extract_expenses(data).unwrap().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].descricao, "EVENTOS INDENIZÁVEIS");
        assert_eq!(records[0].valor_despesas, 1234.56);
        assert_eq!(records[0].trimestre, Some(1));
        assert_eq!(records[1].registro_ans, "419761");
        assert_eq!(records[1].trimestre, Some(2));
    }

    #[test]
    fn test_extract_reads_dots_as_thousands() {
        let data = b"DATA;REG_ANS;DESCRICAO;VL_SALDO_FINAL\n\
2024-01-01;1;EVENTOS;5.000\n\
2024-01-01;2;SINISTROS;1.234.567\n";
        let records = extract_expenses(data).unwrap().unwrap();
        assert_eq!(records[0].valor_despesas, 5000.0);
        assert_eq!(records[1].valor_despesas, 1234567.0);
    }

    #[test]
    fn test_extract_rejects_other_layouts() {
        let data = b"REG_ANS;DESCRICAO\n1;EVENTOS\n";
        assert!(extract_expenses(data).unwrap().is_none());

        let data = b"DATA;REG_ANS;DESCRICAO;VL_SALDO_FINAL\n2024-01-01;1;RECEITAS;5\n";
        assert!(extract_expenses(data).unwrap().is_none());
    }
}
