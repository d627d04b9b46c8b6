// handlers/public/mod.rs - Public handlers (no authentication required)
//
// Security Level: None
// Middleware: tracing + CORS only

pub mod health;   // GET /, GET /health
pub mod products; // GET /products, GET /products/:id

pub use health::{health, root};
pub use products::{get_product, list_products};
