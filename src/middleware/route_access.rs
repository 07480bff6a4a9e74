use axum::{extract::Request, middleware::Next, response::Response};
use once_cell::sync::Lazy;

use crate::error::ApiError;
use crate::middleware::auth::AuthUser;
use crate::types::Role;

/// One gate rule: a path prefix and the roles allowed beneath it.
#[derive(Debug, Clone, Copy)]
pub struct RouteRule {
    pub prefix: &'static str,
    pub allowed: &'static [Role],
}

const ALL_ROLES: &[Role] = &[
    Role::Admin,
    Role::CustomerService,
    Role::SalesRepresentative,
    Role::Client,
];

/// The single source of truth for prefix-based route access; the gate
/// middleware and the link-visibility endpoint both read it.
///
/// Stored sorted by descending prefix length so the first `starts_with` hit
/// is the longest match. Resolution is therefore deterministic regardless of
/// the order rules are written in here.
static GATE: Lazy<Vec<RouteRule>> = Lazy::new(|| {
    let mut rules = vec![
        RouteRule {
            prefix: "/api",
            allowed: ALL_ROLES,
        },
        RouteRule {
            prefix: "/api/announcements",
            allowed: &[Role::Admin],
        },
        RouteRule {
            prefix: "/api/appointments",
            allowed: &[Role::Admin, Role::CustomerService, Role::SalesRepresentative, Role::Client],
        },
        RouteRule {
            prefix: "/api/contracts",
            allowed: &[Role::Admin, Role::SalesRepresentative],
        },
        RouteRule {
            prefix: "/api/inquiries",
            allowed: &[Role::Admin, Role::CustomerService, Role::Client],
        },
        RouteRule {
            prefix: "/api/notifications",
            allowed: ALL_ROLES,
        },
        RouteRule {
            prefix: "/api/reservations",
            allowed: &[Role::Admin, Role::SalesRepresentative, Role::Client],
        },
        RouteRule {
            prefix: "/api/roles",
            allowed: &[Role::Admin],
        },
        RouteRule {
            prefix: "/api/routes",
            allowed: ALL_ROLES,
        },
    ];
    rules.sort_by(|a, b| b.prefix.len().cmp(&a.prefix.len()));
    rules
});

/// Longest-prefix access decision. Paths matching no rule are allowed for
/// any authenticated caller.
pub fn has_route_access(path: &str, role: Role) -> bool {
    for rule in GATE.iter() {
        if path.starts_with(rule.prefix) {
            return rule.allowed.contains(&role);
        }
    }
    true
}

/// The full rule table, for link-visibility answers.
pub fn rules() -> &'static [RouteRule] {
    &GATE
}

/// Gate middleware, layered after authentication.
pub async fn enforce(request: Request, next: Next) -> Result<Response, ApiError> {
    let user = request
        .extensions()
        .get::<AuthUser>()
        .cloned()
        .ok_or_else(|| ApiError::unauthorized("authentication required"))?;

    let path = request.uri().path();
    if !has_route_access(path, user.role) {
        return Err(ApiError::forbidden(format!(
            "role '{}' may not access {}",
            user.role, path
        )));
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn longest_prefix_wins_over_the_api_catch_all() {
        // /api allows everyone; /api/announcements narrows to admin only.
        assert!(has_route_access("/api/announcements", Role::Admin));
        assert!(!has_route_access("/api/announcements", Role::Client));
        assert!(!has_route_access("/api/announcements/123", Role::SalesRepresentative));
    }

    #[test]
    fn unknown_paths_are_allowed() {
        assert!(has_route_access("/health", Role::Client));
        assert!(has_route_access("/totally/unmapped", Role::Client));
    }

    #[test]
    fn decisions_are_deterministic_for_all_roles() {
        for role in [
            Role::Admin,
            Role::CustomerService,
            Role::SalesRepresentative,
            Role::Client,
        ] {
            let first = has_route_access("/api/contracts/abc", role);
            for _ in 0..10 {
                assert_eq!(has_route_access("/api/contracts/abc", role), first);
            }
        }
    }

    #[test]
    fn contracts_are_staff_only() {
        assert!(has_route_access("/api/contracts", Role::Admin));
        assert!(has_route_access("/api/contracts", Role::SalesRepresentative));
        assert!(!has_route_access("/api/contracts", Role::CustomerService));
        assert!(!has_route_access("/api/contracts", Role::Client));
    }

    #[test]
    fn unnarrowed_api_paths_fall_back_to_the_catch_all() {
        assert!(has_route_access("/api/anything-new", Role::Client));
    }
}
