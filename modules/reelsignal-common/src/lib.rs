pub mod config;
pub mod error;
pub mod policy;
pub mod types;

pub use config::PipelineConfig;
pub use error::ReelSignalError;
pub use policy::*;
pub use types::*;
