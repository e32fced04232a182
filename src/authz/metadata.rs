use super::{Permission, Role};

/// Requirements declared at one level (a handler or a controller).
///
/// `None` means nothing was declared at this level; `Some(vec![])` is a declared empty list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessRule {
    pub roles: Option<Vec<Role>>,
    pub permissions: Option<Vec<Permission>>,
}

impl AccessRule {
    /// No declaration at all.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn roles(roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            roles: Some(roles.into_iter().collect()),
            permissions: None,
        }
    }

    pub fn permissions(permissions: Vec<Permission>) -> Self {
        Self {
            roles: None,
            permissions: Some(permissions),
        }
    }

    /// Combines two declarations made at the same level; `other` wins where both declare.
    pub fn and(self, other: AccessRule) -> Self {
        Self {
            roles: other.roles.or(self.roles),
            permissions: other.permissions.or(self.permissions),
        }
    }

    pub fn is_declared(&self) -> bool {
        self.roles.is_some() || self.permissions.is_some()
    }
}

/// Metadata of a matched route: the handler's rule and its controller's rule.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteAccess {
    pub handler: AccessRule,
    pub class: AccessRule,
}

impl RouteAccess {
    pub fn new(class: AccessRule, handler: AccessRule) -> Self {
        Self { handler, class }
    }

    /// Handler-level roles if declared, otherwise class-level roles.
    pub fn required_roles(&self) -> Option<&[Role]> {
        self.handler
            .roles
            .as_deref()
            .or(self.class.roles.as_deref())
    }

    /// Handler-level permissions if declared, otherwise class-level permissions.
    pub fn required_permissions(&self) -> Option<&[Permission]> {
        self.handler
            .permissions
            .as_deref()
            .or(self.class.permissions.as_deref())
    }
}

/// Declares required roles: `roles!(Role::Admin, Role::Petugas)`.
#[macro_export]
macro_rules! roles {
    ($($role:expr),* $(,)?) => {
        $crate::authz::AccessRule::roles(::std::vec::Vec::<$crate::authz::Role>::from([$($role),*]))
    };
}

/// Declares required permissions. Each argument is a permission or a list of permissions,
/// flattened one level: `permissions!(A, [B, C])` declares `[A, B, C]`.
#[macro_export]
macro_rules! permissions {
    ($($arg:expr),* $(,)?) => {{
        let args: ::std::vec::Vec<$crate::authz::PermissionArg> =
            ::std::vec![$($crate::authz::PermissionArg::from($arg)),*];
        $crate::authz::AccessRule::permissions($crate::authz::flatten_permissions(args))
    }};
}
