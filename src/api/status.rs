// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Public service metadata: root status and the agent description.

use axum::{extract::State, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::AppState;

pub const SERVICE_NAME: &str = "DID WBA Gateway";
pub const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Response for GET /
#[derive(Debug, Serialize, ToSchema)]
pub struct RootResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    /// Path of the interactive API documentation
    pub documentation: String,
}

/// Endpoints advertised in the agent description.
#[derive(Debug, Serialize, ToSchema)]
pub struct AgentEndpoints {
    pub auth: String,
    pub verify: String,
    pub test: String,
}

/// Response for GET /agents/example/ad.json
#[derive(Debug, Serialize, ToSchema)]
pub struct AgentDescription {
    pub id: String,
    pub name: String,
    pub description: String,
    pub version: String,
    pub capabilities: Vec<String>,
    pub endpoints: AgentEndpoints,
    pub owner: String,
    pub created_at: String,
}

/// Root status endpoint.
#[utoipa::path(
    get,
    path = "/",
    tag = "Status",
    responses(
        (status = 200, description = "Service is running", body = RootResponse)
    )
)]
pub async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        status: "running".to_string(),
        service: SERVICE_NAME.to_string(),
        version: SERVICE_VERSION.to_string(),
        documentation: "/docs".to_string(),
    })
}

/// Public description of the example agent, referenced from generated DID
/// documents as their `AgentDescription` service.
#[utoipa::path(
    get,
    path = "/agents/example/ad.json",
    tag = "Status",
    responses(
        (status = 200, description = "Agent description", body = AgentDescription)
    )
)]
pub async fn agent_description(State(state): State<AppState>) -> Json<AgentDescription> {
    Json(AgentDescription {
        id: "example-agent".to_string(),
        name: format!("{SERVICE_NAME} Example Agent"),
        description: state.agent_description.to_string(),
        version: SERVICE_VERSION.to_string(),
        capabilities: vec![
            "did-wba-authentication".to_string(),
            "token-authentication".to_string(),
        ],
        endpoints: AgentEndpoints {
            auth: "/auth/did-wba".to_string(),
            verify: "/auth/verify".to_string(),
            test: "/wba/test".to_string(),
        },
        owner: SERVICE_NAME.to_string(),
        created_at: "2025-04-21T00:00:00Z".to_string(),
    })
}
