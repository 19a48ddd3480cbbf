// ============================
// crates/backend-lib/src/auth/mod.rs
// ============================
//! Bearer-token authentication for the REST surface.

mod extract;
mod token;

pub use extract::AuthUser;
pub use token::{Claims, TokenService, DEFAULT_TOKEN_TTL_HOURS};
