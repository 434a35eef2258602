pub mod get;
pub mod list;

pub use get::{GetCustomerError, GetCustomerQuery};
pub use list::{ListCustomersError, ListCustomersQuery};
