//! Tenants and the users that receive calibration reminders

use serde::Serialize;
use uuid::Uuid;

/// Owning organization scoping every record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tenant {
    pub id: Uuid,
    pub name: String,
}

impl Tenant {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
        }
    }
}

/// Access profile inside a tenant
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Profile {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    /// Administrative access to the calibration module
    pub calibration_admin: bool,
}

impl Profile {
    pub fn new(tenant_id: Uuid, name: impl Into<String>, calibration_admin: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            name: name.into(),
            calibration_admin,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub profile_id: Uuid,
    pub name: String,
    pub email: String,
    pub active: bool,
}

impl User {
    pub fn new(
        profile: &Profile,
        name: impl Into<String>,
        email: impl Into<String>,
        active: bool,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id: profile.tenant_id,
            profile_id: profile.id,
            name: name.into(),
            email: email.into(),
            active,
        }
    }
}
