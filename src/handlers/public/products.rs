use axum::{extract::State, Json};

use crate::api::ProductId;
use crate::app::AppState;
use crate::database::Product;
use crate::error::ApiError;

/// GET /products - every product, in storage order
pub async fn list_products(State(state): State<AppState>) -> Result<Json<Vec<Product>>, ApiError> {
    let products = state.store.list().await?;
    tracing::debug!("Listed {} products", products.len());
    Ok(Json(products))
}

/// GET /products/:id
pub async fn get_product(
    State(state): State<AppState>,
    ProductId(id): ProductId,
) -> Result<Json<Product>, ApiError> {
    state
        .store
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Product {} not found", id)))
}
