pub mod bootstrap;
pub mod pipelines;

pub use bootstrap::App;
