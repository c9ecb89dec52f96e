// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Publishes locally stored DID documents so remote verifiers can resolve
//! identities hosted here.

use axum::{
    extract::{Path, State},
    Json,
};

use crate::auth::document::DidDocument;
use crate::error::ApiError;
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/wba/user/{user_id}/did.json",
    tag = "DID",
    params(
        ("user_id" = String, Path, description = "Subject id of the hosted identity")
    ),
    responses(
        (status = 200, description = "DID document"),
        (status = 400, description = "Malformed user id"),
        (status = 404, description = "No document stored for this user"),
    )
)]
pub async fn get_did_document(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<DidDocument>, ApiError> {
    match state.documents.load(&user_id)? {
        Some(document) => Ok(Json(document)),
        None => Err(ApiError::document_not_found(&user_id)),
    }
}
