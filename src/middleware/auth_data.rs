use serde::{Deserialize, Serialize};
use strum::Display;
use surrealdb::sql::Thing;

/// Verified caller identity handed in by the identity collaborator.
/// Explicitly tagged so no handler has to sniff request shapes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Caller {
    pub id: Thing,
    pub role: Role,
}

#[derive(Display, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Role {
    Admin,
    User,
}

impl Caller {
    pub fn user(id: Thing) -> Self {
        Self {
            id,
            role: Role::User,
        }
    }

    pub fn admin(id: Thing) -> Self {
        Self {
            id,
            role: Role::Admin,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}
