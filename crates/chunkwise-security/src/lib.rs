pub mod auth;
pub mod validation;

pub use auth::{ApiKeyAuthenticator, Caller, Role, hash_key};
pub use validation::RequestValidator;
