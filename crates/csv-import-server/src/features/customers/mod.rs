pub mod commands;
pub mod queries;
pub mod routes;
pub mod types;

pub use commands::{
    CreateCustomerCommand, CreateCustomerError, UpdateCustomerCommand, UpdateCustomerError,
};
pub use queries::{GetCustomerError, GetCustomerQuery, ListCustomersError, ListCustomersQuery};
pub use routes::customers_routes;
pub use types::{CustomerFields, CustomerResponse};
