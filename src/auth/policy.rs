/// Authorization policy
///
/// Two predicates cover every resource: the role gate (caller holds an
/// elevated role) and the ownership gate (caller owns the resource, or passes
/// the role gate). Existence is always settled before either gate runs, so a
/// missing resource is reported as not found whoever asks.
use crate::auth::{Identity, Role};
use crate::error::AppError;

/// Anything with a single owning user.
pub trait Owned {
    fn owner_id(&self) -> i64;
}

/// Which roles override ownership / satisfy a role gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Elevation {
    Admin,
    AdminOrStaff,
}

impl Elevation {
    pub fn permits(&self, identity: &Identity) -> bool {
        match self {
            Elevation::Admin => identity.roles.contains(Role::Admin),
            Elevation::AdminOrStaff => {
                identity.roles.contains(Role::Admin) || identity.roles.contains(Role::Staff)
            }
        }
    }
}

/// Role gate.
pub fn require_role(identity: &Identity, elevation: Elevation, denial: &str) -> Result<(), AppError> {
    if elevation.permits(identity) {
        Ok(())
    } else {
        Err(AppError::forbidden(denial))
    }
}

/// Ownership gate against any of `owners` (resource owner, ancestor owner...).
pub fn require_owner(
    identity: &Identity,
    owners: &[i64],
    elevation: Elevation,
    denial: &str,
) -> Result<(), AppError> {
    if owners.contains(&identity.user_id) || elevation.permits(identity) {
        Ok(())
    } else {
        Err(AppError::forbidden(denial))
    }
}

/// Existence check; `what` names the resource in the 404 message.
pub fn found<T>(resource: Option<T>, what: &str) -> Result<T, AppError> {
    resource.ok_or_else(|| AppError::not_found(what))
}

/// Existence, then ownership.
pub fn owned<T: Owned>(
    identity: &Identity,
    resource: Option<T>,
    what: &str,
    elevation: Elevation,
    denial: &str,
) -> Result<T, AppError> {
    let resource = found(resource, what)?;
    require_owner(identity, &[resource.owner_id()], elevation, denial)?;
    Ok(resource)
}

/// Existence, then role.
pub fn role_gated<T>(
    identity: &Identity,
    resource: Option<T>,
    what: &str,
    elevation: Elevation,
    denial: &str,
) -> Result<T, AppError> {
    let resource = found(resource, what)?;
    require_role(identity, elevation, denial)?;
    Ok(resource)
}
