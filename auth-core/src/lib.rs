pub mod config;
pub mod error;
pub mod metrics;
pub mod mfa;
pub mod model;
pub mod service;
pub mod session;
pub mod store;
pub mod tokens;

pub use config::{load_auth_config, AuthConfig};
pub use error::{AuthError, AuthResult};
pub use service::AuthService;
