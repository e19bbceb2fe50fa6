//! JWT authentication and role gating.

pub mod jwt;
pub mod middleware;
pub mod models;

pub use jwt::JwtHandler;
pub use middleware::{auth_middleware, require_admin, AuthError};
pub use models::{Claims, Role};
