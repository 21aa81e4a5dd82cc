pub mod id;
pub mod record;

pub use id::ObjectId;
pub use record::{stored_name, FileRecord, RecordState};
