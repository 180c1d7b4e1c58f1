use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum Role {
    Admin,
    Manager,
    Receptionist,
    Customer,
    #[serde(other)]
    Unknown,
}

impl Role {
    /// Roles that land on the back office after signing in.
    pub fn is_staff_admin(&self) -> bool {
        matches!(self, Role::Admin | Role::Manager)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Role::Admin => "Admin",
            Role::Manager => "Manager",
            Role::Receptionist => "Receptionist",
            Role::Customer => "Customer",
            Role::Unknown => "Unknown",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Admin" => Ok(Role::Admin),
            "Manager" => Ok(Role::Manager),
            "Receptionist" => Ok(Role::Receptionist),
            "Customer" => Ok(Role::Customer),
            _ => Err(anyhow::anyhow!("Unknown role: {s}")),
        }
    }
}

/// Account profile snapshot returned by the account endpoint and cached
/// under the `user` storage key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AccountSummary {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub roles: Vec<Role>,
    #[serde(default)]
    pub is_locked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer: Option<CustomerProfile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employee: Option<EmployeeProfile>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CustomerProfile {
    pub id: i64,
    pub full_name: String,
    pub phone_number: Option<String>,
    pub identity_card: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeProfile {
    pub id: i64,
    pub full_name: String,
    pub position: Option<String>,
    pub phone_number: Option<String>,
}
