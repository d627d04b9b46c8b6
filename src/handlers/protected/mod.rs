// handlers/protected/mod.rs - Protected handlers (JWT authentication required)
//
// Security Level: valid bearer token
// Middleware: require_auth, which injects `AuthUser` into request extensions

pub mod products; // POST /products, PUT/DELETE /products/:id

pub use products::{create_product, delete_product, update_product};
