pub mod manager;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod store;

pub use manager::{DatabaseError, DatabaseManager};
pub use memory::MemoryProductStore;
pub use models::product::{NewProduct, Product, ProductChanges, ProductInput};
pub use postgres::PgProductStore;
pub use store::ProductStore;
