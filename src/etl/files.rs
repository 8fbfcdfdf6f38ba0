//! Layout of the data directory and codecs for the `;`-separated pipeline files.
//!
//! Every file written here uses a decimal comma, matching the ANS sources.

use crate::domain::model::{EnrichedExpense, ExpenseRecord, OperatorAggregate};
use crate::utils::error::{EtlError, Result};
use crate::utils::number::{decode_latin1, format_br_decimal, parse_br_decimal};
use csv::{ReaderBuilder, StringRecord, WriterBuilder};

pub const RAW_DIR: &str = "raw";
pub const PROCESSED_DIR: &str = "processed";
pub const CONSOLIDATED_FILE: &str = "processed/consolidado_despesas.csv";
pub const ENRICHED_FILE: &str = "processed/despesas_enriquecidas.csv";
pub const INCONSISTENCIES_FILE: &str = "processed/inconsistencias.csv";
pub const AGGREGATED_FILE: &str = "processed/agregado_operadoras.csv";
pub const DATABASE_FILE: &str = "ans_database.json";

const EXPENSE_HEADER: [&str; 5] = ["RegistroANS", "Ano", "Trimestre", "DESCRICAO", "ValorDespesas"];
const ENRICHMENT_HEADER: [&str; 3] = ["CNPJ", "RazaoSocial", "UF"];
const AGGREGATE_HEADER: [&str; 5] = [
    "RazaoSocial",
    "UF",
    "TotalDespesas",
    "MediaTrimestral",
    "DesvioPadrao",
];

pub fn raw_path(file_name: &str) -> String {
    format!("{}/{}", RAW_DIR, file_name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Utf8,
    Latin1,
}

/// A parsed `;` table with trimmed, upper-cased headers.
#[derive(Debug)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<StringRecord>,
}

impl Table {
    pub fn parse(bytes: &[u8], encoding: Encoding) -> Result<Self> {
        Self::parse_with_delimiter(bytes, encoding, b';')
    }

    pub fn parse_with_delimiter(bytes: &[u8], encoding: Encoding, delimiter: u8) -> Result<Self> {
        let text = match encoding {
            Encoding::Latin1 => decode_latin1(bytes),
            Encoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
        };
        let text = text.trim_start_matches('\u{feff}');

        let mut reader = ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .from_reader(text.as_bytes());

        let headers = reader
            .headers()?
            .iter()
            .map(|h| h.trim().trim_matches('"').to_uppercase())
            .collect();

        let mut rows = Vec::new();
        let mut skipped = 0usize;
        for record in reader.records() {
            match record {
                Ok(record) => rows.push(record),
                Err(_) => skipped += 1,
            }
        }
        if skipped > 0 {
            tracing::warn!("⚠️ Skipped {} malformed lines", skipped);
        }

        Ok(Self { headers, rows })
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        let wanted = name.to_uppercase();
        self.headers.iter().position(|h| *h == wanted)
    }

    pub fn has_columns(&self, names: &[&str]) -> bool {
        names.iter().all(|n| self.column(n).is_some())
    }
}

pub(crate) fn cell(row: &StringRecord, index: Option<usize>) -> Option<&str> {
    index
        .and_then(|i| row.get(i))
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn writer() -> csv::Writer<Vec<u8>> {
    WriterBuilder::new().delimiter(b';').from_writer(Vec::new())
}

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<Vec<u8>> {
    writer
        .into_inner()
        .map_err(|e| EtlError::IoError(e.into_error()))
}

fn opt_to_string<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn expense_fields(e: &ExpenseRecord) -> [String; 5] {
    [
        e.registro_ans.clone(),
        opt_to_string(e.ano),
        opt_to_string(e.trimestre),
        e.descricao.clone(),
        format_br_decimal(e.valor_despesas),
    ]
}

fn parse_expense(table: &Table, row: &StringRecord) -> ExpenseRecord {
    ExpenseRecord {
        registro_ans: cell(row, table.column("RegistroANS"))
            .unwrap_or_default()
            .to_string(),
        ano: cell(row, table.column("Ano")).and_then(|v| v.parse().ok()),
        trimestre: cell(row, table.column("Trimestre")).and_then(|v| v.parse().ok()),
        descricao: cell(row, table.column("DESCRICAO"))
            .unwrap_or_default()
            .to_string(),
        valor_despesas: cell(row, table.column("ValorDespesas"))
            .and_then(parse_br_decimal)
            .unwrap_or(0.0),
    }
}

pub fn write_expenses(records: &[ExpenseRecord]) -> Result<Vec<u8>> {
    let mut w = writer();
    w.write_record(EXPENSE_HEADER)?;
    for record in records {
        w.write_record(expense_fields(record))?;
    }
    finish(w)
}

pub fn read_expenses(bytes: &[u8]) -> Result<Vec<ExpenseRecord>> {
    let table = Table::parse(bytes, Encoding::Utf8)?;
    Ok(table.rows.iter().map(|row| parse_expense(&table, row)).collect())
}

/// `with_validity` adds the `CNPJ_Valido` column used by the inconsistency report.
pub fn write_enriched(records: &[EnrichedExpense], with_validity: bool) -> Result<Vec<u8>> {
    let mut w = writer();
    let mut header: Vec<&str> = EXPENSE_HEADER.iter().chain(&ENRICHMENT_HEADER).copied().collect();
    if with_validity {
        header.push("CNPJ_Valido");
    }
    w.write_record(&header)?;

    for record in records {
        let mut fields: Vec<String> = expense_fields(&record.expense).into();
        fields.push(record.cnpj.clone().unwrap_or_default());
        fields.push(record.razao_social.clone().unwrap_or_default());
        fields.push(record.uf.clone().unwrap_or_default());
        if with_validity {
            fields.push(if record.cnpj_valido { "True" } else { "False" }.to_string());
        }
        w.write_record(&fields)?;
    }
    finish(w)
}

/// Rows read back from the enriched file are the valid ones.
pub fn read_enriched(bytes: &[u8]) -> Result<Vec<EnrichedExpense>> {
    let table = Table::parse(bytes, Encoding::Utf8)?;
    let (cnpj, razao, uf, valid) = (
        table.column("CNPJ"),
        table.column("RazaoSocial"),
        table.column("UF"),
        table.column("CNPJ_Valido"),
    );

    Ok(table
        .rows
        .iter()
        .map(|row| EnrichedExpense {
            expense: parse_expense(&table, row),
            cnpj: cell(row, cnpj).map(str::to_string),
            razao_social: cell(row, razao).map(str::to_string),
            uf: cell(row, uf).map(str::to_string),
            cnpj_valido: match valid {
                Some(_) => cell(row, valid).is_some_and(|v| v.eq_ignore_ascii_case("true")),
                None => true,
            },
        })
        .collect())
}

pub fn write_aggregates(records: &[OperatorAggregate]) -> Result<Vec<u8>> {
    let mut w = writer();
    w.write_record(AGGREGATE_HEADER)?;
    for a in records {
        w.write_record([
            a.razao_social.clone(),
            a.uf.clone(),
            format_br_decimal(a.total_despesas),
            format_br_decimal(a.media_trimestral),
            format_br_decimal(a.desvio_padrao),
        ])?;
    }
    finish(w)
}

pub fn read_aggregates(bytes: &[u8]) -> Result<Vec<OperatorAggregate>> {
    let table = Table::parse(bytes, Encoding::Utf8)?;
    let number = |row: &StringRecord, name: &str| {
        cell(row, table.column(name))
            .and_then(parse_br_decimal)
            .unwrap_or(0.0)
    };

    Ok(table
        .rows
        .iter()
        .map(|row| OperatorAggregate {
            razao_social: cell(row, table.column("RazaoSocial"))
                .unwrap_or_default()
                .to_string(),
            uf: cell(row, table.column("UF")).unwrap_or_default().to_string(),
            total_despesas: number(row, "TotalDespesas"),
            media_trimestral: number(row, "MediaTrimestral"),
            desvio_padrao: number(row, "DesvioPadrao"),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_normalizes_headers() {
        let data = b" data ;Reg_Ans;descricao\n2024-01-01;123;EVENTOS\n";
        let table = Table::parse(data, Encoding::Utf8).unwrap();
        assert_eq!(table.headers, vec!["DATA", "REG_ANS", "DESCRICAO"]);
        assert!(table.has_columns(&["DATA", "reg_ans"]));
        assert!(!table.has_columns(&["VL_SALDO_FINAL"]));
        assert_eq!(table.rows.len(), 1);
    }

    #[test]
    fn test_expenses_file_layout() {
        let records = vec![ExpenseRecord {
            registro_ans: "316458".to_string(),
            ano: Some(2024),
            trimestre: Some(3),
            descricao: "EVENTOS INDENIZÁVEIS".to_string(),
            valor_despesas: 1500.5,
        }];
        let bytes = write_expenses(&records).unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(text.starts_with("RegistroANS;Ano;Trimestre;DESCRICAO;ValorDespesas\n"));
        assert!(text.contains("316458;2024;3;EVENTOS INDENIZÁVEIS;1500,50"));

        assert_eq!(read_expenses(&bytes).unwrap(), records);
    }

    #[test]
    fn test_missing_period_stays_empty() {
        let bytes = b"RegistroANS;Ano;Trimestre;DESCRICAO;ValorDespesas\n1;;;SINISTROS;2,00\n";
        let records = read_expenses(bytes).unwrap();
        assert_eq!(records[0].ano, None);
        assert_eq!(records[0].trimestre, None);
        assert_eq!(records[0].valor_despesas, 2.0);
    }

    #[test]
    fn test_inconsistency_report_has_validity_column() {
        let record = EnrichedExpense {
            expense: ExpenseRecord {
                registro_ans: "1".to_string(),
                ano: Some(2024),
                trimestre: Some(1),
                descricao: "EVENTOS".to_string(),
                valor_despesas: 10.0,
            },
            cnpj: None,
            razao_social: None,
            uf: None,
            cnpj_valido: false,
        };
        let bytes = write_enriched(&[record], true).unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(text.lines().next().unwrap().ends_with(";CNPJ;RazaoSocial;UF;CNPJ_Valido"));
        assert!(text.contains("1;2024;1;EVENTOS;10,00;;;;False"));
        assert!(!read_enriched(&bytes).unwrap()[0].cnpj_valido);
    }
}
