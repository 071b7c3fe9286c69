//! Feed windowing, tag prediction and export for the feedtag pipeline.
//!
//! A run downloads feed CSVs, keeps the records from the trailing window,
//! predicts each record's categorical tags from the closest reference
//! documents, reshapes the rows for the destinations and persists them.

pub mod batch;
pub mod csv_io;
pub mod error;
pub mod feeds;
pub mod normalizer;
pub mod pipeline;
pub mod predictor;
pub mod sheet;
pub mod shortener;
mod stopwords;
pub mod window;

pub use batch::{
    prepare, reshape, tag_batch, tag_interval_file, BatchReport, BatchStage, BatchState,
    PersistTargets, PreparedRecord,
};
pub use error::TaggerError;
pub use feeds::{feed_csv_url, read_feed_list, DownloadReport, FeedDownloader};
pub use normalizer::top_tokens;
pub use pipeline::{Pipeline, PipelineSettings, RunStatus, RunSummary};
pub use predictor::{predict, reduce_matches, try_predict, Corpus, PredictOptions};
pub use sheet::CodaClient;
pub use shortener::{LinkShortener, PassthroughShortener, ShortIoClient, Shortener};
pub use window::{
    parse_local_timestamp, parse_timestamp, window_directory, window_records, WindowOutcome,
};
