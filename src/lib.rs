mod batch_function;
mod cache;
mod collector;
mod config;
mod context;
mod directory;
mod error;
mod loader;
mod model;
mod registry;
pub mod resolve;
#[cfg(feature = "stats")]
mod stats;
mod store;
mod window;

pub use batch_function::BatchFunction;
pub use collector::BatchCollector;
pub use config::{DirectoryConfig, LoaderConfig};
pub use context::{loaders_from, with_loaders, RequestContext};
pub use directory::{DirectoryCache, DirectorySource};
pub use error::{BoxError, Error, Result, SharedError};
pub use loader::Loader;
pub use model::{Case, CaseId, DirectoryEntry, Risk, RiskId};
pub use registry::{LoaderFactory, LoaderRegistry};
#[cfg(feature = "stats")]
pub use stats::LoaderStats;
pub use store::{CasesByRisk, RiskStore, RisksByCase};
pub use tokio_util::sync::CancellationToken;
