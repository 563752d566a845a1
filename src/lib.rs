// Shared part with the linkcopy binary
pub mod copier;
pub mod engine;
pub mod error;
pub mod report;

pub use copier::Copier;
pub use error::CopyError;
pub use report::{format_count, format_size, Report, Snapshot};
