use crate::domain::User;

/// Elevated roles a user can hold. Ownership is not a role; it is decided per
/// resource by the policy gates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Admin,
    Staff,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RoleSet {
    admin: bool,
    staff: bool,
}

impl RoleSet {
    pub fn from_flags(is_admin: bool, is_staff: bool) -> Self {
        Self {
            admin: is_admin,
            staff: is_staff,
        }
    }

    pub fn with(mut self, role: Role) -> Self {
        match role {
            Role::Admin => self.admin = true,
            Role::Staff => self.staff = true,
        }
        self
    }

    pub fn contains(&self, role: Role) -> bool {
        match role {
            Role::Admin => self.admin,
            Role::Staff => self.staff,
        }
    }
}

/// The caller as resolved by the authorization gate. Services receive this
/// and never look at the token again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub user_id: i64,
    pub roles: RoleSet,
}

impl Identity {
    pub fn new(user_id: i64, roles: RoleSet) -> Self {
        Self { user_id, roles }
    }

    pub fn is_admin(&self) -> bool {
        self.roles.contains(Role::Admin)
    }

    pub fn is_staff(&self) -> bool {
        self.roles.contains(Role::Staff)
    }
}

impl From<&User> for Identity {
    fn from(user: &User) -> Self {
        Identity::new(user.user_id, RoleSet::from_flags(user.is_admin, user.is_staff))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_set() {
        let roles = RoleSet::default();
        assert!(!roles.contains(Role::Admin));
        assert!(!roles.contains(Role::Staff));

        let roles = roles.with(Role::Staff);
        assert!(roles.contains(Role::Staff));
        assert!(!roles.contains(Role::Admin));
    }

    #[test]
    fn test_staff_flag_is_independent_of_admin_flag() {
        let user = User {
            user_id: 5,
            username: "s".to_string(),
            email: "s@example.com".to_string(),
            password_hash: String::new(),
            is_admin: false,
            is_staff: true,
        };
        let identity = Identity::from(&user);
        assert!(!identity.is_admin());
        assert!(identity.is_staff());
    }
}
