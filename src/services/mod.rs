pub mod audit;
pub mod fallback;
pub mod ingest;
