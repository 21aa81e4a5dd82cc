mod error;
mod store;

pub use error::BlobError;
pub use store::BlobStore;
