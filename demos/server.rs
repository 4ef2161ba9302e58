//! REST API server example for the rewards services.
//!
//! Run with: `cargo run --example server`
//!
//! Coins live in an in-memory store and escrows are submitted to an
//! in-memory ledger, so nothing here needs Redis or a network ledger.
//!
//! ## Endpoints
//!
//! - `POST /users/:id/coins` - Award coins for an action (defaults to `in_app_action`)
//! - `GET /users/:id/coins` - Get a user's coin balance
//! - `POST /escrows` - Open an escrow from the platform wallet
//! - `GET /escrows/:id` - Get an escrow record
//! - `POST /escrows/:id/execute` - Mark an escrow executed
//!
//! ## Example Usage
//!
//! ```bash
//! # Award coins
//! curl -X POST http://localhost:3000/users/7/coins \
//!   -H "Content-Type: application/json" \
//!   -d '{"action": "referral"}'
//!
//! # Balance
//! curl http://localhost:3000/users/7/coins
//!
//! # Open an escrow
//! curl -X POST http://localhost:3000/escrows \
//!   -H "Content-Type: application/json" \
//!   -d '{"recipient": "rArtist", "amount": "25.00"}'
//!
//! # Execute it
//! curl -X POST http://localhost:3000/escrows/1/execute
//! ```

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::Utc;
use digitvl_rewards::{
    CoinError, CoinLedger, EscrowConfig, EscrowError, EscrowId, EscrowRegistry,
    EscrowTransaction, ExecuteOutcome, LedgerError, MemoryCoinStore, MemoryEscrowStore,
    MemoryLedger, RewardAction, UserId, Wallet, WalletAddress,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;

// === Request/Response DTOs ===

/// Request body for awarding coins.
///
/// ```json
/// {"action": "in_app_action"}
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct AwardRequest {
    #[serde(default)]
    pub action: Option<RewardAction>,
}

/// Response body for coin balances.
#[derive(Debug, Serialize)]
pub struct CoinsResponse {
    pub user: u64,
    pub total_coins: u64,
}

/// Request body for opening an escrow.
#[derive(Debug, Deserialize)]
pub struct OpenEscrowRequest {
    pub recipient: String,
    pub amount: Decimal,
    #[serde(default)]
    pub condition: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ExecuteResponse {
    pub escrow: u64,
    pub outcome: ExecuteOutcome,
}

/// Response body for errors.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

// === Application State ===

type Registry = EscrowRegistry<MemoryEscrowStore, MemoryLedger>;

#[derive(Clone)]
pub struct AppState {
    pub coins: Arc<CoinLedger<MemoryCoinStore>>,
    pub escrows: Arc<Registry>,
    pub platform: Arc<Wallet>,
}

// === Error Handling ===

/// Wrapper for converting library errors into HTTP responses.
pub enum AppError {
    Coin(CoinError),
    Escrow(EscrowError),
}

impl From<CoinError> for AppError {
    fn from(err: CoinError) -> Self {
        AppError::Coin(err)
    }
}

impl From<EscrowError> for AppError {
    fn from(err: EscrowError) -> Self {
        AppError::Escrow(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Coin(err) => {
                let (status, code) = match err {
                    CoinError::InvalidAmount => (StatusCode::BAD_REQUEST, "INVALID_AMOUNT"),
                    CoinError::Overflow => (StatusCode::UNPROCESSABLE_ENTITY, "COIN_OVERFLOW"),
                    CoinError::Unavailable(_) => {
                        (StatusCode::SERVICE_UNAVAILABLE, "COIN_STORE_UNAVAILABLE")
                    }
                    CoinError::Corrupt(_) => {
                        (StatusCode::INTERNAL_SERVER_ERROR, "COIN_COUNTER_CORRUPT")
                    }
                };
                (status, code, err.to_string())
            }
            AppError::Escrow(err) => {
                let (status, code) = match err {
                    EscrowError::InvalidAmount => (StatusCode::BAD_REQUEST, "INVALID_AMOUNT"),
                    EscrowError::InvalidFee(_) => (StatusCode::BAD_REQUEST, "INVALID_FEE"),
                    EscrowError::InvalidExpiry(_) => {
                        (StatusCode::INTERNAL_SERVER_ERROR, "INVALID_EXPIRY")
                    }
                    EscrowError::InvalidFanSplit(_) => {
                        (StatusCode::BAD_REQUEST, "INVALID_FAN_SPLIT")
                    }
                    EscrowError::NotFound(_) => (StatusCode::NOT_FOUND, "ESCROW_NOT_FOUND"),
                    EscrowError::AllocationInFlight(_) => {
                        (StatusCode::CONFLICT, "ALLOCATION_IN_FLIGHT")
                    }
                    EscrowError::Reservation(LedgerError::Duplicate(_)) => {
                        (StatusCode::CONFLICT, "DUPLICATE_SUBMISSION")
                    }
                    EscrowError::Reservation(LedgerError::Transport(_)) => {
                        (StatusCode::BAD_GATEWAY, "LEDGER_UNAVAILABLE")
                    }
                    EscrowError::Reservation(_) => {
                        (StatusCode::UNPROCESSABLE_ENTITY, "LEDGER_REJECTED")
                    }
                    EscrowError::AfterReservation { .. } => {
                        (StatusCode::BAD_GATEWAY, "ABORTED_AFTER_RESERVATION")
                    }
                    EscrowError::InputResolution { .. } => {
                        (StatusCode::BAD_GATEWAY, "INPUT_RESOLUTION")
                    }
                };
                (status, code, err.to_string())
            }
        };

        (
            status,
            Json(ErrorResponse {
                error: message,
                code: code.to_string(),
            }),
        )
            .into_response()
    }
}

// === Handlers ===

/// POST /users/:id/coins - Award coins for an action.
async fn award_coins(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    body: Option<Json<AwardRequest>>,
) -> Result<Json<CoinsResponse>, AppError> {
    let action = body
        .and_then(|Json(request)| request.action)
        .unwrap_or(RewardAction::InAppAction);
    let amount = state.coins.reward_amount(action);
    let total_coins = state.coins.increment(UserId(id), amount)?;
    Ok(Json(CoinsResponse {
        user: id,
        total_coins,
    }))
}

/// GET /users/:id/coins - Get a user's balance.
async fn get_coins(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<CoinsResponse>, AppError> {
    let total_coins = state.coins.balance(UserId(id))?;
    Ok(Json(CoinsResponse {
        user: id,
        total_coins,
    }))
}

/// POST /escrows - Open an escrow from the platform wallet.
async fn open_escrow(
    State(state): State<AppState>,
    Json(request): Json<OpenEscrowRequest>,
) -> Result<(StatusCode, Json<EscrowTransaction>), AppError> {
    let record = state.escrows.open(
        &state.platform,
        WalletAddress::new(request.recipient),
        request.amount,
        request.condition.unwrap_or_default(),
        Utc::now(),
    )?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /escrows/:id - Get an escrow record.
async fn get_escrow(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<EscrowTransaction>, AppError> {
    state
        .escrows
        .get(EscrowId(id))
        .map(Json)
        .ok_or(AppError::Escrow(EscrowError::NotFound(EscrowId(id))))
}

/// POST /escrows/:id/execute - Mark an escrow executed.
async fn execute_escrow(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<ExecuteResponse>, AppError> {
    let outcome = state.escrows.execute(EscrowId(id))?;
    Ok(Json(ExecuteResponse {
        escrow: id,
        outcome,
    }))
}

// === Router ===

fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/users/{id}/coins", post(award_coins).get(get_coins))
        .route("/escrows", post(open_escrow))
        .route("/escrows/{id}", get(get_escrow))
        .route("/escrows/{id}/execute", post(execute_escrow))
        .with_state(state)
}

// === Main ===

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let state = AppState {
        coins: Arc::new(CoinLedger::new(MemoryCoinStore::new())),
        escrows: Arc::new(EscrowRegistry::new(
            MemoryEscrowStore::new(),
            MemoryLedger::new(),
            EscrowConfig::default(),
        )),
        platform: Arc::new(Wallet::generate()),
    };
    println!("Platform wallet: {}", state.platform.address());

    let app = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:3000").await.unwrap();
    println!("Rewards API server running on http://127.0.0.1:3000");
    println!();
    println!("Endpoints:");
    println!("  POST /users/:id/coins        - Award coins");
    println!("  GET  /users/:id/coins        - Get coin balance");
    println!("  POST /escrows                - Open an escrow");
    println!("  GET  /escrows/:id            - Get an escrow");
    println!("  POST /escrows/:id/execute    - Execute an escrow");

    axum::serve(listener, app).await.unwrap();
}
