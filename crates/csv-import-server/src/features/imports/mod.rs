pub mod commands;
pub mod queries;
pub mod routes;

pub use commands::{StartImportCommand, StartImportError, StartImportResponse};
pub use queries::{GetImportProgressError, GetImportProgressQuery};
pub use routes::imports_routes;
