pub mod get_progress;

pub use get_progress::{GetImportProgressError, GetImportProgressQuery};
