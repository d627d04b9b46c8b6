pub mod extract;

pub use extract::{JsonBody, ProductId};
