use crate::models::account::Role;

/// Where the caller should navigate after a session transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    AdminDashboard,
    Home,
    AccountLocked,
    Login,
}

impl Destination {
    /// Post-login target: staff with Admin or Manager go to the back office.
    pub fn for_roles(roles: &[Role]) -> Self {
        if roles.iter().any(Role::is_staff_admin) {
            Destination::AdminDashboard
        } else {
            Destination::Home
        }
    }
}

/// Concrete paths for each destination, configured per deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destinations {
    pub admin_dashboard: String,
    pub home: String,
    pub account_locked: String,
    pub login: String,
}

impl Default for Destinations {
    fn default() -> Self {
        Self {
            admin_dashboard: "/admin/dashboard".into(),
            home: "/".into(),
            account_locked: "/account-locked".into(),
            login: "/login".into(),
        }
    }
}

impl Destinations {
    pub fn path(&self, destination: Destination) -> &str {
        match destination {
            Destination::AdminDashboard => &self.admin_dashboard,
            Destination::Home => &self.home,
            Destination::AccountLocked => &self.account_locked,
            Destination::Login => &self.login,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_or_manager_routes_to_dashboard() {
        assert_eq!(
            Destination::for_roles(&[Role::Customer, Role::Admin]),
            Destination::AdminDashboard
        );
        assert_eq!(Destination::for_roles(&[Role::Manager]), Destination::AdminDashboard);
    }

    #[test]
    fn everyone_else_routes_home() {
        assert_eq!(Destination::for_roles(&[]), Destination::Home);
        assert_eq!(
            Destination::for_roles(&[Role::Receptionist, Role::Customer]),
            Destination::Home
        );
    }

    #[test]
    fn default_paths() {
        let d = Destinations::default();
        assert_eq!(d.path(Destination::AdminDashboard), "/admin/dashboard");
        assert_eq!(d.path(Destination::AccountLocked), "/account-locked");
    }
}
