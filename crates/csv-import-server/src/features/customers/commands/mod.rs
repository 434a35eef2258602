pub mod create;
pub mod update;

pub use create::{CreateCustomerCommand, CreateCustomerError};
pub use update::{UpdateCustomerCommand, UpdateCustomerError};
