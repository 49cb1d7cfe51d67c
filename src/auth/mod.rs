/// Authentication and authorization
///
/// Token minting and verification, password hashing, the session store
/// lifecycle, the authorization gate that resolves a bearer token into an
/// `Identity`, and the role/ownership policy the services apply to it.

mod claims;
mod extractor;
mod gate;
mod identity;
mod jwt;
mod password;
mod policy;
mod session;

pub use claims::{Claims, TokenType};
pub use gate::{bearer_token, AuthorizationGate};
pub use identity::{Identity, Role, RoleSet};
pub use jwt::{hash_token, IssuedToken, TokenIssuer, TokenVerifier};
pub use password::{hash_password, verify_credentials, verify_password};
pub use policy::{found, owned, require_owner, require_role, role_gated, Elevation, Owned};
pub use session::{invalidate_session, issue_session, mint_session, SessionTokens};
