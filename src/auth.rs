//! Bearer-token domain: scope sets, redacted secrets, signing-key resolution, and validation.

pub mod jwks;
pub mod scope;
pub mod secret;
pub mod validator;

pub use jwks::*;
pub use scope::*;
pub use secret::*;
pub use validator::*;
