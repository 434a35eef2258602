pub mod start_import;

pub use start_import::{StartImportCommand, StartImportError, StartImportResponse};
