use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who is acting on a booking. Authentication happens upstream; handlers
/// receive an already-verified identity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ActorRole {
    Client,
    BusinessOwner,
    Employee,
    PlatformAdmin,
}

impl ActorRole {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "client" => Some(ActorRole::Client),
            "business_owner" => Some(ActorRole::BusinessOwner),
            "employee" => Some(ActorRole::Employee),
            "platform_admin" => Some(ActorRole::PlatformAdmin),
            _ => None,
        }
    }

    /// Staff roles bypass the client cancellation windows.
    pub fn is_staff(&self) -> bool {
        matches!(
            self,
            ActorRole::BusinessOwner | ActorRole::Employee | ActorRole::PlatformAdmin
        )
    }
}

#[derive(Debug, Clone)]
pub struct ActorContext {
    pub actor_id: Uuid,
    pub role: ActorRole,
}
