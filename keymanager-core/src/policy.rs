use keymanager_spec::auth::{ANY, Action, Operation, Resource, UserInfo};
use keymanager_spec::{Error, Result};
use std::collections::HashSet;
use tracing::warn;

/// Authorization decisions for one caller.
///
/// Wildcards in the caller's permissions are expanded once at construction;
/// the resolver is immutable afterwards and can be shared freely.
#[derive(Debug, Clone)]
pub struct Resolver {
    tenant: String,
    granted: HashSet<Operation>,
}

impl Resolver {
    pub fn new(user: &UserInfo) -> Self {
        let mut granted = HashSet::new();
        for permission in &user.permissions {
            let (action, resource) = match permission.split_once(':') {
                Some(parts) => parts,
                None if permission == ANY => (ANY, ANY),
                None => {
                    warn!(permission = %permission, "ignoring malformed permission");
                    continue;
                }
            };
            let Some(actions) = expand::<Action>(action, &Action::ALL) else {
                warn!(permission = %permission, "ignoring permission with unknown action");
                continue;
            };
            let Some(resources) = expand::<Resource>(resource, &Resource::ALL) else {
                warn!(permission = %permission, "ignoring permission with unknown resource");
                continue;
            };
            for action in &actions {
                for resource in &resources {
                    granted.insert(Operation::new(*action, *resource));
                }
            }
        }

        Self {
            tenant: user.tenant.clone(),
            granted,
        }
    }

    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    /// Whether the caller may see a store restricted to `allowed_tenants`.
    pub fn can_access(&self, allowed_tenants: &[String]) -> bool {
        allowed_tenants.is_empty()
            || allowed_tenants
                .iter()
                .any(|tenant| tenant == ANY || *tenant == self.tenant)
    }

    pub fn check_access(&self, allowed_tenants: &[String]) -> Result<()> {
        if self.can_access(allowed_tenants) {
            return Ok(());
        }
        Err(Error::Forbidden(format!(
            "tenant '{}' is not allowed to access this store",
            self.tenant
        )))
    }

    /// Fails on the first operation the caller was not granted.
    pub fn check(&self, operations: &[Operation]) -> Result<()> {
        match operations.iter().find(|op| !self.granted.contains(op)) {
            Some(missing) => Err(Error::Forbidden(format!("missing permission '{missing}'"))),
            None => Ok(()),
        }
    }
}

fn expand<T: std::str::FromStr + Copy>(token: &str, all: &[T]) -> Option<Vec<T>> {
    if token == ANY {
        return Some(all.to_vec());
    }
    token.parse().ok().map(|value| vec![value])
}
