pub mod collector;
pub mod pipeline;
pub mod planner;
pub mod scorer;
pub mod sentiment;
pub mod stats;
pub mod tracker;
pub mod trend;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use pipeline::{run_pipeline, Pipeline};
pub use planner::RolloutPlanner;
pub use scorer::RegionalScorer;
pub use sentiment::{SentimentAnalyzer, SentimentLabel, SentimentReport};
pub use tracker::SourceTracker;
pub use trend::{TrendDetector, TrendReport};
