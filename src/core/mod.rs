pub mod etl;

pub use crate::domain::model::{
    EnrichedExpense, ExpenseRecord, OperatorAggregate, OperatorRecord, TransformResult,
};
pub use crate::domain::ports::{ConfigProvider, Pipeline, Storage};
pub use crate::utils::error::Result;
