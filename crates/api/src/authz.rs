//! API-side authorization guard for commands.
//!
//! This enforces authorization at the command boundary (before the ledger
//! runs), while keeping domain and infra crates auth-agnostic.

use defter_auth::{
    AuthzError, CommandAuthorization, Permission, Principal, TenantMembership, authorize,
};

use crate::context::{PrincipalContext, TenantContext};

/// Check authorization for a command in the current request context.
///
/// This is intended to be called **before** executing a ledger operation.
pub fn authorize_command<C: CommandAuthorization>(
    tenant: &TenantContext,
    principal: &PrincipalContext,
    command: &C,
) -> Result<(), AuthzError> {
    let membership = TenantMembership {
        tenant_id: tenant.tenant_id(),
        roles: principal.roles().to_vec(),
        permissions: permissions_from_roles(principal.roles()),
    };

    let principal = Principal {
        principal_id: principal.principal_id(),
        active_tenant_id: tenant.tenant_id(),
        membership,
    };

    for perm in command.required_permissions() {
        authorize(&principal, perm)?;
    }

    Ok(())
}

/// Role→permission mapping.
///
/// "admin" grants everything. Every other authenticated principal gets the
/// back-office base set; the admin-gated invoice transitions (approve,
/// revert, revert-to-approved, status override) are deliberately absent
/// from it.
fn permissions_from_roles(roles: &[defter_auth::Role]) -> Vec<Permission> {
    if roles.iter().any(|r| r.as_str() == "admin") {
        return vec![Permission::new("*")];
    }

    [
        "invoices.create",
        "invoices.settle",
        "invoices.delete",
        "products.write",
        "products.stock_count",
        "parties.write",
        "accounts.write",
        "accounts.transfer",
        "transactions.write",
        "notifications.write",
    ]
    .into_iter()
    .map(Permission::new)
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use defter_auth::{PrincipalId, Role};
    use defter_core::TenantId;

    struct Cmd {
        required: Vec<Permission>,
    }

    impl CommandAuthorization for Cmd {
        fn required_permissions(&self) -> &[Permission] {
            &self.required
        }
    }

    fn contexts(role: &'static str) -> (TenantContext, PrincipalContext) {
        let tenant = TenantContext::new(TenantId::new());
        let principal = PrincipalContext::new(PrincipalId::new(), vec![Role::new(role)]);
        (tenant, principal)
    }

    #[test]
    fn admin_gets_admin_gated_transitions() {
        let (tenant, principal) = contexts("admin");
        let cmd = Cmd {
            required: vec![Permission::new("invoices.approve")],
        };
        assert!(authorize_command(&tenant, &principal, &cmd).is_ok());
    }

    #[test]
    fn staff_cannot_approve_but_can_settle() {
        let (tenant, principal) = contexts("staff");
        let approve = Cmd {
            required: vec![Permission::new("invoices.approve")],
        };
        assert!(authorize_command(&tenant, &principal, &approve).is_err());

        let settle = Cmd {
            required: vec![Permission::new("invoices.settle")],
        };
        assert!(authorize_command(&tenant, &principal, &settle).is_ok());
    }
}
