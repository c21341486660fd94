use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::question::Difficulty;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub level: Difficulty,
    #[serde(default)]
    pub skill: String,
    #[serde(default)]
    pub team_id: String,
    #[serde(default)]
    pub department: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Role {
    Admin,
    #[serde(rename = "HR")]
    Hr,
    Manager,
    #[default]
    Employee,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::Hr => "HR",
            Role::Manager => "Manager",
            Role::Employee => "Employee",
        }
    }
}
