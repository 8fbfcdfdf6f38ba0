pub mod expense_pipeline;

pub use expense_pipeline::ExpensePipeline;
