pub mod auth;

pub use auth::{issue_token, AuthLayer, AuthMiddleware, CallerIdentity, Claims};
