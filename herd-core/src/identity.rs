//! Identity types used to partition the response cache

use serde::{Deserialize, Serialize};
use std::fmt;

/// Tenant identifier.
///
/// Tenants are numeric in the backing store. [`TenantId::INVALID`] stands in
/// for callers whose identity could not be resolved; all such callers share a
/// single cache partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(i64);

impl TenantId {
    /// Sentinel for an unauthenticated or unknown caller.
    pub const INVALID: TenantId = TenantId(-1);

    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    pub const fn get(self) -> i64 {
        self.0
    }

    /// Tenant ids are non-negative; every negative id counts as invalid.
    pub fn is_valid(self) -> bool {
        self.0 >= 0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Role identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleId(i64);

impl RoleId {
    /// Role carried by anonymous callers.
    pub const NONE: RoleId = RoleId(-1);

    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The caller identity as far as response content is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub tenant_id: TenantId,
    pub role_id: RoleId,
}

impl Identity {
    pub const fn new(tenant_id: TenantId, role_id: RoleId) -> Self {
        Self { tenant_id, role_id }
    }

    /// Identity used when no authenticated context is available.
    pub const fn anonymous() -> Self {
        Self {
            tenant_id: TenantId::INVALID,
            role_id: RoleId::NONE,
        }
    }

    /// True when the tenant is a real, resolved tenant.
    pub fn is_authenticated(&self) -> bool {
        self.tenant_id.is_valid()
    }
}

impl Default for Identity {
    fn default() -> Self {
        Self::anonymous()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymous_identity_is_not_authenticated() {
        let identity = Identity::anonymous();
        assert!(!identity.is_authenticated());
        assert_eq!(identity.tenant_id, TenantId::INVALID);
        assert_eq!(identity.role_id, RoleId::NONE);
        assert_eq!(Identity::default(), identity);
    }

    #[test]
    fn test_real_tenant_is_authenticated() {
        let identity = Identity::new(TenantId::new(7), RoleId::new(3));
        assert!(identity.is_authenticated());
        assert_eq!(identity.tenant_id.get(), 7);
        assert_eq!(identity.role_id.to_string(), "3");
    }

    #[test]
    fn test_tenant_zero_is_valid() {
        assert!(TenantId::new(0).is_valid());
    }

    #[test]
    fn test_any_negative_tenant_is_unauthenticated() {
        for id in [-1, -2, i64::MIN] {
            assert!(!TenantId::new(id).is_valid(), "tenant {} must be invalid", id);
            let identity = Identity::new(TenantId::new(id), RoleId::new(1));
            assert!(!identity.is_authenticated());
        }
    }
}
