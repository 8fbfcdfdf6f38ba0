//! In-process expenses database.
//!
//! Three tables mirror the processed files: operators, detailed expenses and
//! per-operator aggregates. The whole database is persisted as one JSON
//! snapshot through the `Storage` port and served read-only by the API.

use crate::core::{EnrichedExpense, OperatorAggregate, Storage};
use crate::utils::error::Result;
use crate::utils::number::round2;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorRow {
    pub registro_ans: String,
    pub cnpj: Option<String>,
    pub razao_social: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailedExpenseRow {
    pub id: u64,
    pub registro_ans: String,
    pub ano: Option<i32>,
    pub trimestre: Option<u32>,
    pub descricao: String,
    pub valor_despesa: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedExpenseRow {
    pub id: u64,
    pub razao_social: String,
    pub uf: String,
    pub total_despesas: f64,
    pub media_trimestral: f64,
    pub desvio_padrao: f64,
}

/// `GET /operadoras` item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorStats {
    pub razao_social: String,
    pub uf: String,
    pub total_despesas: f64,
}

/// `GET /dashboard/top-10` item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopOperator {
    pub razao_social: String,
    pub registro_ans: String,
    pub total_despesas: f64,
}

/// `GET /dashboard/resumo` body. The total is `None` on an empty database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub total_gasto_geral: Option<f64>,
    pub total_operadoras_analisadas: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpenseDatabase {
    pub operadoras: Vec<OperatorRow>,
    pub despesas_detalhadas: Vec<DetailedExpenseRow>,
    pub despesas_agregadas: Vec<AggregatedExpenseRow>,
}

impl ExpenseDatabase {
    pub async fn load<S: Storage>(storage: &S, path: &str) -> Result<Self> {
        let bytes = storage.read_file(path).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Missing snapshot gives an empty database.
    pub async fn load_or_default<S: Storage>(storage: &S, path: &str) -> Result<Self> {
        if storage.exists(path).await {
            Self::load(storage, path).await
        } else {
            Ok(Self::default())
        }
    }

    pub async fn save<S: Storage>(&self, storage: &S, path: &str) -> Result<()> {
        storage
            .write_file(path, &serde_json::to_vec_pretty(self)?)
            .await
    }

    pub fn truncate(&mut self) {
        self.operadoras.clear();
        self.despesas_detalhadas.clear();
        self.despesas_agregadas.clear();
    }

    fn next_id<T>(rows: &[T], id: impl Fn(&T) -> u64) -> u64 {
        rows.iter().map(id).max().unwrap_or(0) + 1
    }

    /// Inserts the operators of the given lines. Registration numbers already
    /// present are left untouched. Returns how many were inserted.
    pub fn insert_operators(&mut self, lines: &[EnrichedExpense]) -> usize {
        let mut known: HashSet<String> =
            self.operadoras.iter().map(|o| o.registro_ans.clone()).collect();
        let before = self.operadoras.len();

        for line in lines {
            if known.insert(line.expense.registro_ans.clone()) {
                self.operadoras.push(OperatorRow {
                    registro_ans: line.expense.registro_ans.clone(),
                    cnpj: line.cnpj.clone(),
                    razao_social: line.razao_social.clone(),
                });
            }
        }

        self.operadoras.len() - before
    }

    pub fn insert_expenses(&mut self, lines: &[EnrichedExpense]) -> usize {
        let mut id = Self::next_id(&self.despesas_detalhadas, |r| r.id);
        for line in lines {
            self.despesas_detalhadas.push(DetailedExpenseRow {
                id,
                registro_ans: line.expense.registro_ans.clone(),
                ano: line.expense.ano,
                trimestre: line.expense.trimestre,
                descricao: line.expense.descricao.clone(),
                valor_despesa: round2(line.expense.valor_despesas),
            });
            id += 1;
        }
        lines.len()
    }

    pub fn insert_aggregates(&mut self, aggregates: &[OperatorAggregate]) -> usize {
        let mut id = Self::next_id(&self.despesas_agregadas, |r| r.id);
        for a in aggregates {
            self.despesas_agregadas.push(AggregatedExpenseRow {
                id,
                razao_social: a.razao_social.clone(),
                uf: a.uf.clone(),
                total_despesas: round2(a.total_despesas),
                media_trimestral: round2(a.media_trimestral),
                desvio_padrao: round2(a.desvio_padrao),
            });
            id += 1;
        }
        aggregates.len()
    }

    /// Aggregated operators, optionally filtered by a case-insensitive name
    /// fragment, largest total first.
    pub fn search_operators(&self, search: Option<&str>, limit: usize) -> Vec<OperatorStats> {
        let needle = search.map(str::to_lowercase);
        let mut rows: Vec<&AggregatedExpenseRow> = self
            .despesas_agregadas
            .iter()
            .filter(|r| match &needle {
                Some(n) => r.razao_social.to_lowercase().contains(n.as_str()),
                None => true,
            })
            .collect();
        rows.sort_by(|a, b| b.total_despesas.total_cmp(&a.total_despesas));

        rows.into_iter()
            .take(limit)
            .map(|r| OperatorStats {
                razao_social: r.razao_social.clone(),
                uf: r.uf.clone(),
                total_despesas: r.total_despesas,
            })
            .collect()
    }

    /// Detailed expenses joined with operators, summed per operator.
    pub fn top_operators(&self, n: usize) -> Vec<TopOperator> {
        let names: HashMap<&str, &str> = self
            .operadoras
            .iter()
            .map(|o| {
                (
                    o.registro_ans.as_str(),
                    o.razao_social.as_deref().unwrap_or_default(),
                )
            })
            .collect();

        let mut totals: HashMap<(&str, &str), f64> = HashMap::new();
        for row in &self.despesas_detalhadas {
            let Some(&name) = names.get(row.registro_ans.as_str()) else {
                continue;
            };
            *totals.entry((name, row.registro_ans.as_str())).or_insert(0.0) += row.valor_despesa;
        }

        let mut top: Vec<TopOperator> = totals
            .into_iter()
            .map(|((name, reg), total)| TopOperator {
                razao_social: name.to_string(),
                registro_ans: reg.to_string(),
                total_despesas: round2(total),
            })
            .collect();
        top.sort_by(|a, b| {
            b.total_despesas
                .total_cmp(&a.total_despesas)
                .then_with(|| a.registro_ans.cmp(&b.registro_ans))
        });
        top.truncate(n);
        top
    }

    pub fn summary(&self) -> Summary {
        let total = (!self.despesas_detalhadas.is_empty()).then(|| {
            round2(self.despesas_detalhadas.iter().map(|r| r.valor_despesa).sum())
        });
        Summary {
            total_gasto_geral: total,
            total_operadoras_analisadas: self.operadoras.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ExpenseRecord;

    fn line(reg: &str, name: &str, value: f64) -> EnrichedExpense {
        EnrichedExpense {
            expense: ExpenseRecord {
                registro_ans: reg.to_string(),
                ano: Some(2024),
                trimestre: Some(1),
                descricao: "EVENTOS".to_string(),
                valor_despesas: value,
            },
            cnpj: Some("11222333000181".to_string()),
            razao_social: Some(name.to_string()),
            uf: Some("SP".to_string()),
            cnpj_valido: true,
        }
    }

    fn aggregate(name: &str, total: f64) -> OperatorAggregate {
        OperatorAggregate {
            razao_social: name.to_string(),
            uf: "SP".to_string(),
            total_despesas: total,
            media_trimestral: total,
            desvio_padrao: 0.0,
        }
    }

    fn sample() -> ExpenseDatabase {
        let lines = vec![
            line("1", "Saude Alfa", 10.0),
            line("1", "Saude Alfa", 15.0),
            line("2", "Beta Planos", 40.0),
            line("3", "Gama Saude", 5.0),
        ];
        let mut db = ExpenseDatabase::default();
        db.insert_operators(&lines);
        db.insert_expenses(&lines);
        db.insert_aggregates(&[
            aggregate("Beta Planos", 40.0),
            aggregate("Saude Alfa", 25.0),
            aggregate("Gama Saude", 5.0),
        ]);
        db
    }

    #[test]
    fn test_operators_are_unique() {
        let mut db = sample();
        assert_eq!(db.operadoras.len(), 3);
        assert_eq!(db.insert_operators(&[line("1", "Outra", 1.0)]), 0);
        assert_eq!(db.operadoras[0].razao_social.as_deref(), Some("Saude Alfa"));
    }

    #[test]
    fn test_expense_ids_continue_after_append() {
        let mut db = sample();
        db.insert_expenses(&[line("2", "Beta Planos", 1.0)]);
        let ids: Vec<u64> = db.despesas_detalhadas.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_search_operators() {
        let db = sample();
        let all = db.search_operators(None, 10);
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].razao_social, "Beta Planos");

        let found = db.search_operators(Some("SAUDE"), 10);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].razao_social, "Saude Alfa");

        assert_eq!(db.search_operators(None, 1).len(), 1);
        assert!(db.search_operators(Some("delta"), 10).is_empty());
    }

    #[test]
    fn test_top_operators_sums_detailed_expenses() {
        let db = sample();
        let top = db.top_operators(10);
        assert_eq!(top.len(), 3);
        assert_eq!(top[0].registro_ans, "2");
        assert_eq!(top[1].razao_social, "Saude Alfa");
        assert_eq!(top[1].total_despesas, 25.0);
        assert_eq!(db.top_operators(2).len(), 2);
    }

    #[test]
    fn test_summary() {
        let db = sample();
        let summary = db.summary();
        assert_eq!(summary.total_gasto_geral, Some(70.0));
        assert_eq!(summary.total_operadoras_analisadas, 3);

        let empty = ExpenseDatabase::default().summary();
        assert_eq!(empty.total_gasto_geral, None);
        assert_eq!(empty.total_operadoras_analisadas, 0);
    }

    #[test]
    fn test_truncate() {
        let mut db = sample();
        db.truncate();
        assert_eq!(db, ExpenseDatabase::default());
    }
}
