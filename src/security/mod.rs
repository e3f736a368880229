pub mod cors;
pub mod jwt;
pub mod password;

pub use cors::create_cors_layer;
pub use jwt::{extract_bearer_token, Claims, IssuedToken, JwtManager};
pub use password::{hash_password, validate_password, verify_password};
