//! Modera Classifiers
//!
//! Adapters that turn one content item into one branch outcome. Each adapter
//! wraps a classifier backend (a black-box capability object) and hides
//! whether the backend answers synchronously or through a pollable job.

pub mod adapter;
#[cfg(feature = "aws")]
pub mod aws;
pub mod backend;
pub mod image;
pub mod poller;
pub mod registry;
pub mod retry;
pub mod text;
pub mod video;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use adapter::{
    AnalysisParams, BranchTask, ClassifierAdapter, JobStatus, JobStatusSource, PollableJob,
};
pub use backend::{
    BackendError, ImageModerationBackend, ObjectReader, ScoredLabel, TextAnalysisBackend,
    VideoJobStatus, VideoModerationBackend,
};
pub use image::ImageAdapter;
pub use poller::JobPoller;
pub use registry::AdapterRegistry;
pub use retry::{RetryPolicy, Retryable};
pub use text::TextAdapter;
pub use video::VideoAdapter;
