//! Caller identity asserted by the upstream identity provider.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use nexus_audit::Actor;
use nexus_types::{AgentId, BrokerId, Role, UserId};

use crate::RpcError;

pub const USER_HEADER: &str = "x-nexus-user";
pub const ROLE_HEADER: &str = "x-nexus-role";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Caller {
    pub id: UserId,
    pub role: Role,
}

impl Caller {
    /// Fail with 403 unless the caller holds `role`.
    pub fn require(&self, role: Role) -> Result<(), RpcError> {
        if self.role == role {
            Ok(())
        } else {
            tracing::debug!(user = %self.id, role = %self.role, required = %role, "role gate refused");
            Err(RpcError::Forbidden(role))
        }
    }

    pub fn as_agent(&self) -> Result<AgentId, RpcError> {
        self.require(Role::Agent)?;
        Ok(AgentId::new(self.id.as_str()))
    }

    pub fn as_broker(&self) -> Result<BrokerId, RpcError> {
        self.require(Role::Broker)?;
        Ok(BrokerId::new(self.id.as_str()))
    }

    pub fn actor(&self) -> Actor {
        Actor::new(self.id.clone(), self.role)
    }
}

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = RpcError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = header(parts, USER_HEADER)
            .and_then(|raw| UserId::parse(raw).ok())
            .ok_or(RpcError::Unauthenticated)?;
        let role = header(parts, ROLE_HEADER)
            .and_then(|raw| raw.parse::<Role>().ok())
            .ok_or(RpcError::Unauthenticated)?;
        Ok(Caller { id, role })
    }
}
