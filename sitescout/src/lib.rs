pub mod config;
pub mod errors;
pub mod fetch;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod results;
pub mod search;
pub mod sink;
pub mod source;

pub use config::{CliOverrides, EncodingMode, ScoutConfig};
pub use errors::{FetchError, ScoutError, ScoutResult, SearchError};
pub use fetch::{Fetch, FetchOptions, HttpFetcher};
pub use pipeline::{run_pipeline, scout, Pipeline};
pub use results::{FetchOutcome, RunSummary, SearchOutcome, Target};
pub use sink::{CsvSink, MemorySink, ResultSink};
pub use source::CsvTargetSource;
