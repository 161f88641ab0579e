pub mod bearer;
pub mod claims;
pub mod config;
pub mod context;
pub mod error;
pub mod extractors;
pub mod guards;
pub mod jwks;
pub mod keyset;
pub mod roles;
pub mod validator;
pub mod verifier;

pub use claims::{ClaimViolation, Claims, SchemaViolations, VerifiedPayload};
pub use config::{AuthConfig, ConfigError};
pub use context::AuthContext;
pub use error::{AuthError, AuthResult, TokenError, ValidationFailure};
pub use extractors::{Authenticated, MaybeAuthenticated};
pub use guards::{authorize, require_any_role, require_role, require_tenant_access, Requirement};
pub use jwks::{JwksFetcher, JwksSource};
pub use keyset::RemoteKeySet;
pub use roles::{Role, ALL_ROLES};
pub use validator::AuthValidator;
pub use verifier::ClaimsVerifier;
