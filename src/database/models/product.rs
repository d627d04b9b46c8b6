use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Stored product row
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Product {
    pub id: i64,
    #[sqlx(rename = "title")]
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub user_id: i64,
}

/// Request body accepted by create and update.
///
/// Caller-supplied `id` and `user_id` are ignored: the id comes from storage
/// and the owner from the validated token.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductInput {
    #[serde(default, alias = "title")]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: f64,
}

impl ProductInput {
    /// Presence check shared by create and update
    pub fn require_name(&self) -> Result<(), &'static str> {
        if self.name.trim().is_empty() {
            Err("Field 'name' is required")
        } else {
            Ok(())
        }
    }
}

/// Fields ready for insert
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub user_id: i64,
}

impl NewProduct {
    pub fn from_input(input: ProductInput, owner: i64) -> Self {
        Self {
            name: input.name,
            description: input.description,
            price: input.price,
            user_id: owner,
        }
    }
}

/// The only fields an update is allowed to touch
#[derive(Debug, Clone)]
pub struct ProductChanges {
    pub name: String,
    pub price: f64,
}

impl From<ProductInput> for ProductChanges {
    fn from(input: ProductInput) -> Self {
        Self {
            name: input.name,
            price: input.price,
        }
    }
}
