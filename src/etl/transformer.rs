use crate::core::{ConfigProvider, EnrichedExpense, ExpenseRecord, OperatorRecord, Storage};
use crate::domain::cnpj::is_valid as is_valid_cnpj;
use crate::etl::files::{self, cell, Encoding, Table};
use crate::etl::listing::{download_cached, fetch_links, join_url};
use crate::utils::error::{EtlError, Result};
use reqwest::Client;
use std::collections::HashMap;

/// Registry keyed by normalized ANS registration number.
pub type OperatorRegistry = HashMap<String, OperatorRecord>;

/// Enriched lines split by CNPJ validity.
#[derive(Debug, Default)]
pub struct Enrichment {
    pub valid: Vec<EnrichedExpense>,
    pub invalid: Vec<EnrichedExpense>,
}

/// Registration numbers sometimes arrive as floats (`316458.0`).
pub fn normalize_registry_key(raw: &str) -> String {
    let trimmed = raw.trim();
    trimmed.strip_suffix(".0").unwrap_or(trimmed).trim().to_string()
}

fn registry_table(bytes: &[u8]) -> Result<Table> {
    let table = Table::parse(bytes, Encoding::Latin1)?;
    if table.column("REGISTRO_OPERADORA").is_some() {
        return Ok(table);
    }
    Table::parse_with_delimiter(bytes, Encoding::Latin1, b',')
}

/// Parses the active operators registry. The first row of a repeated
/// registration number wins.
pub fn parse_registry(bytes: &[u8]) -> Result<OperatorRegistry> {
    let table = registry_table(bytes)?;
    tracing::debug!("Registry columns: {:?}", &table.headers[..table.headers.len().min(5)]);

    let reg_col = table.column("REGISTRO_OPERADORA").ok_or_else(|| {
        EtlError::processing("registry has no REGISTRO_OPERADORA column")
    })?;
    let cnpj_col = table.column("CNPJ");
    let name_col = table.column("RAZAO_SOCIAL");
    let uf_col = table.column("UF").or_else(|| table.column("SIGLA_UF"));

    let mut registry = OperatorRegistry::new();
    for row in &table.rows {
        let Some(reg) = cell(row, Some(reg_col)).map(normalize_registry_key) else {
            continue;
        };
        registry.entry(reg.clone()).or_insert_with(|| OperatorRecord {
            registro_ans: reg,
            cnpj: cell(row, cnpj_col).map(str::to_string),
            razao_social: cell(row, name_col).map(str::to_string),
            uf: cell(row, uf_col).map(str::to_string),
        });
    }
    Ok(registry)
}

/// Left join of expenses with the registry followed by CNPJ validation.
/// Unmatched lines have no CNPJ and end up invalid.
pub fn enrich(expenses: Vec<ExpenseRecord>, registry: &OperatorRegistry) -> Enrichment {
    let mut out = Enrichment::default();

    for mut expense in expenses {
        expense.registro_ans = normalize_registry_key(&expense.registro_ans);
        let operator = registry.get(&expense.registro_ans);
        let cnpj = operator.and_then(|o| o.cnpj.clone());
        let cnpj_valido = cnpj.as_deref().is_some_and(is_valid_cnpj);

        let enriched = EnrichedExpense {
            cnpj,
            razao_social: operator.and_then(|o| o.razao_social.clone()),
            uf: operator.and_then(|o| o.uf.clone()),
            cnpj_valido,
            expense,
        };

        if cnpj_valido {
            out.valid.push(enriched);
        } else {
            out.invalid.push(enriched);
        }
    }

    out
}

/// First `.csv` link of the registry folder.
pub async fn find_registry_url(client: &Client, listing_url: &str) -> Result<String> {
    tracing::info!("🔎 Looking for the operators registry at {}", listing_url);
    let links = fetch_links(client, listing_url).await?;
    let href = links
        .iter()
        .find(|l| l.to_lowercase().ends_with(".csv"))
        .ok_or_else(|| EtlError::processing("no CSV found in the operators registry listing"))?;
    join_url(listing_url, href)
}

/// Downloads the registry into `raw/` (cached) and returns its storage path.
pub async fn download_registry<S: Storage, C: ConfigProvider>(
    client: &Client,
    storage: &S,
    config: &C,
) -> Result<String> {
    let url = find_registry_url(client, config.registry_url()).await?;
    let file_name = url.rsplit('/').next().unwrap_or("Relatorio_cadop.csv");
    let path = files::raw_path(file_name);
    download_cached(client, storage, &url, &path).await?;
    Ok(path)
}

/// Step 3/5. Enriches consolidated expenses and writes the enriched file
/// (valid CNPJs) and the inconsistency report (everything else).
///
/// When `expenses` is `None` the consolidated file is read from storage.
pub async fn transform<S: Storage, C: ConfigProvider>(
    client: &Client,
    storage: &S,
    config: &C,
    expenses: Option<Vec<ExpenseRecord>>,
) -> Result<Enrichment> {
    tracing::info!("--- 🔄 Enriching expenses ---");

    let expenses = match expenses {
        Some(expenses) => expenses,
        None => {
            if !storage.exists(files::CONSOLIDATED_FILE).await {
                return Err(EtlError::processing(format!(
                    "{} not found, run the consolidate step first",
                    files::CONSOLIDATED_FILE
                )));
            }
            files::read_expenses(&storage.read_file(files::CONSOLIDATED_FILE).await?)?
        }
    };

    let registry_path = download_registry(client, storage, config).await?;
    let registry = parse_registry(&storage.read_file(&registry_path).await?)?;
    tracing::info!("📖 Registry has {} operators", registry.len());

    let total = expenses.len();
    let enrichment = enrich(expenses, &registry);

    tracing::info!(
        "📊 {} lines: {} valid CNPJ, {} invalid or unmatched",
        total,
        enrichment.valid.len(),
        enrichment.invalid.len()
    );

    storage
        .write_file(files::ENRICHED_FILE, &files::write_enriched(&enrichment.valid, false)?)
        .await?;
    storage
        .write_file(
            files::INCONSISTENCIES_FILE,
            &files::write_enriched(&enrichment.invalid, true)?,
        )
        .await?;

    Ok(enrichment)
}
