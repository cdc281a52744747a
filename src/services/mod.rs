pub mod executor;
pub mod fetcher;
pub mod job_store;
pub mod metrics;
pub mod orchestrator;
pub mod pool_manager;
pub mod retention;
pub mod retry;
#[cfg(test)]
pub mod test_support;

pub use executor::TaskExecutor;
pub use fetcher::{Fetcher, HttpFetcher};
pub use job_store::JobStore;
pub use orchestrator::Orchestrator;
pub use pool_manager::FetchPool;
pub use retention::RetentionService;
pub use retry::RetryPolicy;
