//! The five pipeline steps: scrape, consolidate, transform, aggregate, import.
//! Each step reads and writes through the `Storage` port and can run alone.

pub mod aggregator;
pub mod consolidator;
pub mod files;
pub mod importer;
pub mod listing;
pub mod scraper;
pub mod transformer;
pub mod validator;
