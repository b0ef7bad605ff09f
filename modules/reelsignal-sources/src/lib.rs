pub mod cache;
pub mod engagement;
pub mod error;
pub mod metadata;
pub mod pageviews;
pub mod source;
pub mod trends;

pub use cache::FetchCache;
pub use engagement::{parse_video_ref, EngagementSource};
pub use error::{Result, SourceError};
pub use metadata::MetadataSource;
pub use pageviews::PageviewSource;
pub use source::{FetchContext, RetryPolicy, SignalDraft, SignalSource, SourceBatch, TrendPoint};
pub use trends::TrendSource;
