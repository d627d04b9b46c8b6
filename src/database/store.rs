use async_trait::async_trait;

use crate::database::manager::DatabaseError;
use crate::database::models::product::{NewProduct, Product, ProductChanges};

/// Storage boundary for products. Handlers only ever see this trait.
#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn list(&self) -> Result<Vec<Product>, DatabaseError>;

    async fn get(&self, id: i64) -> Result<Option<Product>, DatabaseError>;

    async fn insert(&self, product: NewProduct) -> Result<Product, DatabaseError>;

    /// Overwrites name and price. `None` when no row has `id`.
    async fn update(&self, id: i64, changes: ProductChanges) -> Result<Option<Product>, DatabaseError>;

    /// `true` if a row was removed
    async fn delete(&self, id: i64) -> Result<bool, DatabaseError>;

    async fn health_check(&self) -> Result<(), DatabaseError>;

    /// Release connections; called once on shutdown
    async fn close(&self) {}
}
