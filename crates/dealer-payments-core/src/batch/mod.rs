pub mod export;
pub mod runner;

pub use export::{to_csv_string, write_csv};
pub use runner::{run_batch, summarize, BatchItemResult, BatchSummary};
