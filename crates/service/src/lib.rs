pub mod error;
pub mod reconciler;
pub mod service;

pub use error::FileServiceError;
pub use reconciler::{Reconciler, ReconcilerConfig};
pub use service::{FileService, FileServiceConfig, RangeDeleteOutcome, Upload};
