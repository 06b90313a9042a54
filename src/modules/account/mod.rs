pub mod controller;
pub mod crud;
pub mod interface;
pub mod memory;
pub mod model;
pub mod routes;
pub mod schema;
pub mod service;

pub use crud::MySqlAccountStore;
pub use interface::{AccountError, AccountStore};
pub use memory::MemoryAccountStore;
pub use routes::account_routes;
pub use service::AccountService;
