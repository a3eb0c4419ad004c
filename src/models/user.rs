use serde::{Deserialize, Serialize};

/// The signed-in user, taken from verified session claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Read-only view of a user record owned by the auth provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserContact {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl UserContact {
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or("Trader")
    }
}
