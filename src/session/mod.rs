use std::collections::BTreeSet;

use serde::Deserialize;

use crate::transport::Transport;

pub const DEFAULT_IDENTITY_PATH: &str = "/.auth/me";
pub const DEFAULT_LOGIN_PATH: &str = "/.auth/login/aad";
pub const DEFAULT_LOGOUT_PATH: &str = "/.auth/logout";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Session {
    pub authenticated: bool,
    pub display_name: Option<String>,
    pub roles: BTreeSet<String>,
}

impl Session {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn from_principal(principal: Principal) -> Self {
        Self {
            authenticated: true,
            display_name: principal.user_details,
            roles: principal.user_roles.into_iter().collect(),
        }
    }

    pub fn greeting(&self) -> Option<String> {
        if !self.authenticated {
            return None;
        }
        let roles = self.roles.iter().map(String::as_str).collect::<Vec<_>>();
        Some(format!(
            "Welcome, {} Roles:({})!",
            self.display_name.as_deref().unwrap_or_default(),
            roles.join(", ")
        ))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct Principal {
    #[serde(rename = "userDetails", default)]
    pub user_details: Option<String>,
    #[serde(rename = "userRoles", default)]
    pub user_roles: Vec<String>,
    #[serde(rename = "identityProvider", default)]
    pub identity_provider: Option<String>,
    #[serde(rename = "userId", default)]
    pub user_id: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
struct IdentityPayload {
    #[serde(rename = "clientPrincipal", default)]
    client_principal: Option<Principal>,
}

/// Absence of a principal, or a body that does not parse, means anonymous.
pub fn parse_identity(body: &[u8]) -> Result<Option<Principal>, serde_json::Error> {
    let payload: IdentityPayload = serde_json::from_slice(body)?;
    Ok(payload.client_principal)
}

/// One read of the identity endpoint. Never fails: problems are logged and
/// the session stays anonymous.
pub async fn resolve_session(transport: &dyn Transport, identity_path: &str) -> Session {
    let resp = match transport.get(identity_path).await {
        Ok(resp) => resp,
        Err(e) => {
            tracing::warn!(error = %e, "identity lookup failed, continuing anonymously");
            return Session::anonymous();
        }
    };
    if !resp.is_success() {
        tracing::warn!(status = resp.status, "identity endpoint returned non-success");
        return Session::anonymous();
    }
    match parse_identity(&resp.body) {
        Ok(Some(principal)) => {
            tracing::debug!(
                user = principal.user_details.as_deref().unwrap_or_default(),
                provider = principal.identity_provider.as_deref().unwrap_or_default(),
                "session resolved"
            );
            Session::from_principal(principal)
        }
        Ok(None) => Session::anonymous(),
        Err(e) => {
            tracing::warn!(error = %e, "identity payload did not parse");
            Session::anonymous()
        }
    }
}

/// Navigation targets for the identity provider. Neither produces a
/// response that the page consumes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthLinks {
    pub identity_path: String,
    pub login_url: String,
    pub logout_url: String,
}

impl Default for AuthLinks {
    fn default() -> Self {
        Self {
            identity_path: DEFAULT_IDENTITY_PATH.to_string(),
            login_url: DEFAULT_LOGIN_PATH.to_string(),
            logout_url: DEFAULT_LOGOUT_PATH.to_string(),
        }
    }
}
