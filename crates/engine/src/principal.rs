use serde::{Deserialize, Serialize};

use crate::{EngineError, ResultEngine};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SystemAdmin,
    ReceiptLogger,
    BasicUser,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SystemAdmin => "system_admin",
            Self::ReceiptLogger => "receipt_logger",
            Self::BasicUser => "basic_user",
        }
    }
}

impl TryFrom<&str> for Role {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "system_admin" => Ok(Self::SystemAdmin),
            "receipt_logger" => Ok(Self::ReceiptLogger),
            "basic_user" => Ok(Self::BasicUser),
            other => Err(EngineError::Validation(format!("invalid role: {other}"))),
        }
    }
}

/// Authenticated caller, supplied by the auth collaborator and trusted as-is.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: i64,
    pub display_name: String,
    pub role: Role,
    pub active: bool,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        self.role == Role::SystemAdmin
    }

    pub(crate) fn ensure_active(&self) -> ResultEngine<()> {
        if !self.active {
            return Err(EngineError::Permission(format!(
                "user {} is not active",
                self.id
            )));
        }
        Ok(())
    }

    pub(crate) fn ensure_role(&self, allowed: &[Role]) -> ResultEngine<()> {
        self.ensure_active()?;
        if !allowed.contains(&self.role) {
            return Err(EngineError::Permission(format!(
                "role {} is not allowed to perform this action",
                self.role.as_str()
            )));
        }
        Ok(())
    }

    /// Owners and admins may act on a resource.
    pub(crate) fn ensure_owner_or_admin(&self, owner_id: i64) -> ResultEngine<()> {
        self.ensure_active()?;
        if self.id != owner_id && !self.is_admin() {
            return Err(EngineError::Permission(
                "receipt belongs to another user".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(role: Role, active: bool) -> Principal {
        Principal {
            id: 42,
            display_name: "Ada".to_string(),
            role,
            active,
        }
    }

    #[test]
    fn inactive_principals_are_rejected() {
        let p = principal(Role::SystemAdmin, false);
        assert!(matches!(p.ensure_active(), Err(EngineError::Permission(_))));
        assert!(p.ensure_owner_or_admin(42).is_err());
    }

    #[test]
    fn admins_bypass_ownership() {
        assert!(principal(Role::SystemAdmin, true).ensure_owner_or_admin(7).is_ok());
        assert!(principal(Role::ReceiptLogger, true).ensure_owner_or_admin(7).is_err());
        assert!(principal(Role::BasicUser, true).ensure_owner_or_admin(42).is_ok());
    }

    #[test]
    fn role_gate() {
        let allowed = [Role::SystemAdmin, Role::ReceiptLogger];
        assert!(principal(Role::ReceiptLogger, true).ensure_role(&allowed).is_ok());
        assert!(principal(Role::BasicUser, true).ensure_role(&allowed).is_err());
    }
}
