use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Teacher,
}

/// A staff record from the user directory. Never mutated at runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaffAccount {
    pub username: String,
    pub password_hash: String,
    pub name: String,
    pub role: Role,
}

/// What a session resolves to. Carries no credential material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub username: String,
    pub name: String,
    pub role: Role,
}

impl From<&StaffAccount> for Identity {
    fn from(account: &StaffAccount) -> Self {
        Self {
            username: account.username.clone(),
            name: account.name.clone(),
            role: account.role,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    pub description: String,
    pub schedule: String,
    pub max_participants: usize,
    pub participants: Vec<String>,
}
