use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};

use crate::api::{JsonBody, ProductId};
use crate::app::AppState;
use crate::database::{NewProduct, Product, ProductChanges, ProductInput};
use crate::error::ApiError;
use crate::middleware::AuthUser;

/// POST /products - create a product owned by the caller.
///
/// Any `user_id` in the body is ignored; the owner is always the token subject.
pub async fn create_product(
    State(state): State<AppState>,
    user: AuthUser,
    JsonBody(input): JsonBody<ProductInput>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    input.require_name().map_err(ApiError::bad_request)?;

    let product = state
        .store
        .insert(NewProduct::from_input(input, user.user_id))
        .await?;

    tracing::info!("Created product {} for user {}", product.id, user.user_id);
    Ok((StatusCode::CREATED, Json(product)))
}

/// PUT /products/:id - overwrite name and price
pub async fn update_product(
    State(state): State<AppState>,
    user: AuthUser,
    ProductId(id): ProductId,
    JsonBody(input): JsonBody<ProductInput>,
) -> Result<Json<Product>, ApiError> {
    input.require_name().map_err(ApiError::bad_request)?;

    if state.enforce_ownership {
        ensure_owner(&state, id, user).await?;
    }

    let product = state
        .store
        .update(id, ProductChanges::from(input))
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Product {} not found", id)))?;

    tracing::info!("Updated product {} by user {}", id, user.user_id);
    Ok(Json(product))
}

/// DELETE /products/:id
pub async fn delete_product(
    State(state): State<AppState>,
    user: AuthUser,
    ProductId(id): ProductId,
) -> Result<Json<Value>, ApiError> {
    if state.enforce_ownership {
        ensure_owner(&state, id, user).await?;
    }

    if !state.store.delete(id).await? {
        return Err(ApiError::not_found(format!("Product {} not found", id)));
    }

    tracing::info!("Deleted product {} by user {}", id, user.user_id);
    Ok(Json(json!({ "id": id, "deleted": true })))
}

/// 404 if the product is gone, 403 if someone else owns it
async fn ensure_owner(state: &AppState, id: i64, user: AuthUser) -> Result<(), ApiError> {
    let existing = state
        .store
        .get(id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Product {} not found", id)))?;

    if existing.user_id != user.user_id {
        tracing::warn!(
            "User {} attempted to modify product {} owned by user {}",
            user.user_id,
            id,
            existing.user_id
        );
        return Err(ApiError::forbidden("Only the product owner may modify it"));
    }
    Ok(())
}
