// handlers/mod.rs - Two handler tiers
//
// Public (no auth) → Protected (bearer token required).
// The router applies `middleware::require_auth` to every protected route.
pub mod public;    // Reads and service probes
pub mod protected; // Product writes
