//! Domain layer of the authenticator.

pub mod claims;
pub mod error;
pub mod issuer;
pub mod origin;
pub mod parser;
pub mod service;
pub mod verifier;

pub use claims::{ClaimValue, Claims, DecodedToken};
pub use error::AuthError;
pub use issuer::TokenBuilder;
pub use origin::{HostResolver, SystemResolver};
pub use service::Authenticator;
pub use verifier::{SignatureVerifier, TrustPath, TrustVerifier};
