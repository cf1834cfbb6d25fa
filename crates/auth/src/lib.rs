//! `defter-auth` — authentication/authorization boundary (zero-trust).
//!
//! Token issuance (registration/login) happens outside this system; this
//! crate only validates presented tokens and answers permission checks.

pub mod authorize;
pub mod claims;
pub mod jwt;
pub mod permissions;
pub mod principal;
pub mod roles;

pub use authorize::{AuthzError, CommandAuthorization, Principal, authorize};
pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use jwt::{Hs256JwtValidator, JwtError, JwtValidator};
pub use permissions::Permission;
pub use principal::{PrincipalId, TenantMembership};
pub use roles::Role;
