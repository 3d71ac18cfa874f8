use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{BakeryError, BakeryResult};

/// Staff roles. A closed set: a misspelt role name fails to parse instead of
/// silently routing notifications to nobody.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Picker,
    Baker,
    Courier,
    Admin,
    StoreManager,
}

text_enum!(Role, "role" {
    Picker => "picker",
    Baker => "baker",
    Courier => "courier",
    Admin => "admin",
    StoreManager => "store_manager",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    UpdatePicking,
    UpdateBaking,
    HandleDelivery,
    HandOverPickup,
    CreateOrders,
    ManageOrders,
    ForceTransitions,
    TriggerEscalation,
    ViewAllNotifications,
}

text_enum!(Capability, "capability" {
    UpdatePicking => "update_picking",
    UpdateBaking => "update_baking",
    HandleDelivery => "handle_delivery",
    HandOverPickup => "hand_over_pickup",
    CreateOrders => "create_orders",
    ManageOrders => "manage_orders",
    ForceTransitions => "force_transitions",
    TriggerEscalation => "trigger_escalation",
    ViewAllNotifications => "view_all_notifications",
});

use Capability::*;

const PICKER: &[Capability] = &[UpdatePicking, HandOverPickup];
const BAKER: &[Capability] = &[UpdateBaking, CreateOrders];
const COURIER: &[Capability] = &[HandleDelivery];
const ADMIN: &[Capability] = &[
    UpdatePicking,
    UpdateBaking,
    HandleDelivery,
    HandOverPickup,
    CreateOrders,
    ManageOrders,
    ForceTransitions,
    TriggerEscalation,
    ViewAllNotifications,
];
const STORE_MANAGER: &[Capability] = &[
    UpdatePicking,
    UpdateBaking,
    HandleDelivery,
    HandOverPickup,
    CreateOrders,
    ManageOrders,
    ForceTransitions,
    TriggerEscalation,
];

impl Role {
    pub fn capabilities(&self) -> &'static [Capability] {
        match self {
            Self::Picker => PICKER,
            Self::Baker => BAKER,
            Self::Courier => COURIER,
            Self::Admin => ADMIN,
            Self::StoreManager => STORE_MANAGER,
        }
    }

    pub fn can(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }
}

/// Who is performing an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    /// The escalation processor and other automated paths.
    System,
    User { role: Role, name: Option<String> },
}

impl Actor {
    pub fn user(role: Role) -> Self {
        Self::User { role, name: None }
    }

    pub fn named(role: Role, name: impl Into<String>) -> Self {
        Self::User {
            role,
            name: Some(name.into()),
        }
    }

    pub fn role(&self) -> Option<Role> {
        match self {
            Self::System => None,
            Self::User { role, .. } => Some(*role),
        }
    }

    /// The system actor holds every capability.
    pub fn can(&self, capability: Capability) -> bool {
        match self {
            Self::System => true,
            Self::User { role, .. } => role.can(capability),
        }
    }

    pub fn require(&self, capability: Capability) -> BakeryResult<()> {
        if self.can(capability) {
            Ok(())
        } else {
            Err(BakeryError::Forbidden {
                actor: self.label(),
                capability,
            })
        }
    }

    pub fn label(&self) -> String {
        match self {
            Self::System => "system".to_string(),
            Self::User { role, name: Some(name) } => format!("{name} ({role})"),
            Self::User { role, name: None } => role.to_string(),
        }
    }
}
