use serde::{Deserialize, Serialize};

/// Staff and client roles recognized across the back office.
///
/// Every role string entering the process (JWT claim, database row, request
/// body) is folded through [`Role::parse`] exactly once; past that point the
/// code only compares enum variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    CustomerService,
    SalesRepresentative,
    Client,
}

impl Role {
    /// Case-insensitive parse tolerating underscore/space variants.
    pub fn parse(raw: &str) -> Option<Role> {
        match raw.trim().to_lowercase().replace('_', " ").as_str() {
            "admin" | "administrator" => Some(Role::Admin),
            "customer service" | "cs" => Some(Role::CustomerService),
            "sales representative" | "sales rep" | "sales" => Some(Role::SalesRepresentative),
            "client" | "customer" => Some(Role::Client),
            _ => None,
        }
    }

    /// Canonical lowercase name, matching the `rolename` column of the
    /// roles lookup table.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::CustomerService => "customer service",
            Role::SalesRepresentative => "sales representative",
            Role::Client => "client",
        }
    }

    pub fn is_staff(&self) -> bool {
        !matches!(self, Role::Client)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!(Role::parse("Admin"), Some(Role::Admin));
        assert_eq!(Role::parse("CUSTOMER SERVICE"), Some(Role::CustomerService));
        assert_eq!(Role::parse("customer_service"), Some(Role::CustomerService));
        assert_eq!(Role::parse("Sales Representative"), Some(Role::SalesRepresentative));
        assert_eq!(Role::parse("  client "), Some(Role::Client));
        assert_eq!(Role::parse("janitor"), None);
    }

    #[test]
    fn canonical_names_round_trip() {
        for role in [
            Role::Admin,
            Role::CustomerService,
            Role::SalesRepresentative,
            Role::Client,
        ] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
    }

    #[test]
    fn staff_excludes_client() {
        assert!(Role::Admin.is_staff());
        assert!(Role::CustomerService.is_staff());
        assert!(Role::SalesRepresentative.is_staff());
        assert!(!Role::Client.is_staff());
    }
}
