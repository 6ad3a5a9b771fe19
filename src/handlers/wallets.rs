use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde_json::{json, Map, Value};

use crate::error::LedgerError;
use crate::models::ids::parse_uuid;
use crate::models::Wallet;
use crate::services::{LedgerStore, OperationRequest};
use crate::utils::money_serde::MoneyInput;
use crate::AppState;

type ApiError = (StatusCode, Json<Value>);

fn invalid_body(message: String) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({"error": message, "code": "INVALID_BODY"})),
    )
}

/// Parse a request body as a JSON object, whatever the content type. An empty body is `{}`.
/// Field types are checked by the caller so they surface as ledger errors.
fn json_object(body: &Bytes) -> Result<Map<String, Value>, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(fields)) => Ok(fields),
        Ok(_) => Err(invalid_body("Expected a JSON object".to_string())),
        Err(e) => Err(invalid_body(format!("Invalid JSON body: {}", e))),
    }
}

/// Create a wallet. The body is optional; `{"balance": "100.00"}` seeds it.
pub async fn create_wallet<S: LedgerStore>(
    State(state): State<AppState<S>>,
    body: Bytes,
) -> Result<(StatusCode, Json<Wallet>), ApiError> {
    let fields = json_object(&body)?;

    let balance = MoneyInput::from_json(fields.get("balance")).map(MoneyInput::into_text);
    let wallet = state
        .engine
        .create_wallet(balance.as_deref())
        .await
        .map_err(LedgerError::into_http)?;

    Ok((StatusCode::CREATED, Json(wallet)))
}

/// Listing every wallet is not offered.
pub async fn list_wallets() -> ApiError {
    (
        StatusCode::FORBIDDEN,
        Json(json!({"error": "Listing wallets is not allowed"})),
    )
}

/// Get wallet details
pub async fn get_wallet<S: LedgerStore>(
    Path(wallet_id): Path<String>,
    State(state): State<AppState<S>>,
) -> Result<Json<Wallet>, ApiError> {
    // An id that is not a UUID cannot name a wallet
    let wallet_uuid = parse_uuid(&wallet_id, "wallet_id").map_err(|_| LedgerError::WalletNotFound.into_http())?;

    let wallet = state
        .engine
        .get_wallet(wallet_uuid)
        .await
        .map_err(LedgerError::into_http)?;

    Ok(Json(wallet))
}

/// Deposit into or withdraw from a wallet. The body is validated before the wallet is looked up.
pub async fn apply_operation<S: LedgerStore>(
    Path(wallet_id): Path<String>,
    State(state): State<AppState<S>>,
    body: Bytes,
) -> Result<Json<Wallet>, ApiError> {
    let fields = json_object(&body).map_err(|e| {
        tracing::warn!("Unreadable operation body for wallet {}", wallet_id);
        e
    })?;

    // Non-string types keep their JSON text and fail as an invalid choice
    let operation_type = match fields.get("operation_type") {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    };
    let amount = MoneyInput::from_json(fields.get("amount"))
        .map(MoneyInput::into_text)
        .unwrap_or_default();

    let request = OperationRequest::validate(&operation_type, &amount).map_err(|e| {
        tracing::warn!("Invalid operation request for wallet {}: {}", wallet_id, e);
        e.into_http()
    })?;

    let wallet_uuid = parse_uuid(&wallet_id, "wallet_id").map_err(|_| LedgerError::WalletNotFound.into_http())?;

    let wallet = state
        .engine
        .apply(wallet_uuid, request)
        .await
        .map_err(LedgerError::into_http)?;

    Ok(Json(wallet))
}
