pub mod config;
pub mod controller;
pub mod error;
pub mod gate;
pub mod models;
pub mod timer;
pub mod traits;

#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use config::GatewayConfig;
pub use controller::{JobController, JobEvent, JobReporter, TracingJobReporter};
pub use error::{AppError, FailureKind};
pub use gate::{AdmissionGate, Slot};
pub use models::{CrawlOptions, CrawlOutput, Job, JobState};
pub use traits::{BoxCrawler, Crawler};
