use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
};
use be_auth_service::AdminSession;
use be_payment_service::gateway::StkQueryResponse;
use be_remote_db::{MpesaTransaction, PaginationParams};
use serde::Deserialize;

use super::parse_id;
use crate::{error::AdminError, state::AdminState};

const DEFAULT_RECENT_LIMIT: u32 = 10;

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub offset: Option<u32>,
    pub limit: Option<u32>,
}

pub async fn list_transactions(
    _session: AdminSession,
    State(state): State<Arc<AdminState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<MpesaTransaction>>, AdminError> {
    let params = PaginationParams::new(
        query.offset.unwrap_or(0),
        query.limit.unwrap_or(PaginationParams::MAX_LIMIT),
    );
    Ok(Json(state.store.list_transactions(params).await?))
}

pub async fn recent_transactions(
    _session: AdminSession,
    State(state): State<Arc<AdminState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<MpesaTransaction>>, AdminError> {
    let params = PaginationParams::new(0, query.limit.unwrap_or(DEFAULT_RECENT_LIMIT));
    Ok(Json(state.store.list_transactions(params).await?))
}

pub async fn get_transaction(
    _session: AdminSession,
    State(state): State<Arc<AdminState>>,
    Path(id): Path<String>,
) -> Result<Json<MpesaTransaction>, AdminError> {
    let id = parse_id(&id, "Transaction")?;
    let transaction = state
        .store
        .get_transaction(id)
        .await
        .map_err(AdminError::from_lookup("Transaction"))?;
    Ok(Json(transaction))
}

/// Asks the provider for the current state of a push. Read-only: the
/// stored transaction is only ever finalized by the webhook.
pub async fn query_transaction(
    session: AdminSession,
    State(state): State<Arc<AdminState>>,
    Path(id): Path<String>,
) -> Result<Json<StkQueryResponse>, AdminError> {
    session.require_write()?;
    let id = parse_id(&id, "Transaction")?;
    let transaction = state
        .store
        .get_transaction(id)
        .await
        .map_err(AdminError::from_lookup("Transaction"))?;

    let checkout_request_id = transaction.checkout_request_id.ok_or_else(|| {
        AdminError::Validation("Transaction has no checkout request".into())
    })?;

    Ok(Json(
        state.gateway.query_status(&checkout_request_id).await?,
    ))
}
