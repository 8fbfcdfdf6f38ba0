use serde::{Deserialize, Serialize};

/// One "event/claim" expense line taken from a quarterly accounting statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseRecord {
    pub registro_ans: String,
    pub ano: Option<i32>,
    pub trimestre: Option<u32>,
    pub descricao: String,
    pub valor_despesas: f64,
}

/// Registry data of an active operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorRecord {
    pub registro_ans: String,
    pub cnpj: Option<String>,
    pub razao_social: Option<String>,
    pub uf: Option<String>,
}

/// Expense line after the left join with the operator registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedExpense {
    pub expense: ExpenseRecord,
    pub cnpj: Option<String>,
    pub razao_social: Option<String>,
    pub uf: Option<String>,
    pub cnpj_valido: bool,
}

/// Per-operator statistics over quarterly expense totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorAggregate {
    pub razao_social: String,
    pub uf: String,
    pub total_despesas: f64,
    pub media_trimestral: f64,
    pub desvio_padrao: f64,
}

#[derive(Debug, Clone, Default)]
pub struct TransformResult {
    pub enriched: Vec<EnrichedExpense>,
    pub inconsistencies: Vec<EnrichedExpense>,
    pub aggregates: Vec<OperatorAggregate>,
}
