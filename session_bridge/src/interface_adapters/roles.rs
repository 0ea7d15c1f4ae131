use serde_json::Value;

use crate::domain::{RoleLookup, User};

// Reads the role the provider stamps into `app_metadata.role`, falling back
// to the `roles` array some projects use instead.
#[derive(Clone, Debug)]
pub struct MetadataRoleLookup {
    admin_role: String,
}

impl MetadataRoleLookup {
    pub fn new(admin_role: impl Into<String>) -> Self {
        Self {
            admin_role: admin_role.into(),
        }
    }
}

impl RoleLookup for MetadataRoleLookup {
    fn is_admin(&self, user: &User) -> bool {
        if let Some(Value::String(role)) = user.app_metadata.get("role") {
            return role == &self.admin_role;
        }

        match user.app_metadata.get("roles") {
            Some(Value::Array(roles)) => roles
                .iter()
                .any(|role| role.as_str() == Some(self.admin_role.as_str())),
            _ => false,
        }
    }
}
