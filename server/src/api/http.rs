use axum::{
    extract::{Query, State as AxumState},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use funnel_ledger::{Error, Signal};
use funnel_types::{
    api::{
        AdminRequest, AdminResponse, AffiliateLinkResponse, ApiStatus, ClearUserResponse,
        PlayerRequest, PostbackQuery, PostbackResponse, PromoCodeResponse, SetPromoCodeRequest,
        UsePredictionResponse, VerifyQuery, VerifyResponse,
    },
    AdminCheck, Consumption, GateStatus, PlayerId, PromoUpdate, DEFAULT_PROMO_CODE,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

use crate::Server;

const SERVER_ERROR_MESSAGE: &str =
    "An unexpected error occurred on our server. Please try again later.";

#[derive(Serialize)]
struct HealthzResponse {
    ok: bool,
    store: &'static str,
}

/// Liveness check.
pub(super) async fn healthz(AxumState(server): AxumState<Arc<Server>>) -> Response {
    Json(HealthzResponse {
        ok: true,
        store: server.funnel().store().name(),
    })
    .into_response()
}

pub(super) async fn prometheus_metrics(
    headers: HeaderMap,
    AxumState(server): AxumState<Arc<Server>>,
) -> Response {
    if let Some(status) = metrics_auth_error(server.config().metrics_auth_token.as_deref(), &headers)
    {
        return status.into_response();
    }
    (
        StatusCode::OK,
        [(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; version=0.0.4"),
        )],
        server.metrics().render_prometheus(),
    )
        .into_response()
}

fn metrics_auth_error(token: Option<&str>, headers: &HeaderMap) -> Option<StatusCode> {
    let token = token.filter(|token| !token.is_empty())?;
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));
    let header_token = headers
        .get("x-metrics-token")
        .and_then(|value| value.to_str().ok());
    if bearer == Some(token) || header_token == Some(token) {
        None
    } else {
        Some(StatusCode::UNAUTHORIZED)
    }
}

fn store_failure(server: &Server, err: &Error, operation: &str, player_id: Option<&str>) {
    server.metrics().inc_store_failure();
    tracing::error!(operation, player_id, "store failure: {err}");
}

/// Partner network notification.
pub(super) async fn postback(
    AxumState(server): AxumState<Arc<Server>>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Response {
    let start = Instant::now();
    let query: PostbackQuery = pairs.into_iter().collect();
    tracing::info!(?query, "postback received");

    let result = server
        .funnel()
        .record_postback(query.player_id(), query.event_kind(), query.amount.clone())
        .await;
    let (player, outcome) = match result {
        Ok(applied) => applied,
        Err(err @ (Error::InvalidIdentifier(_) | Error::MissingEventKind)) => {
            server.metrics().inc_postback_rejected();
            tracing::warn!(?query, "postback rejected: {err}");
            let (status, message) = match err {
                Error::MissingEventKind => (
                    ApiStatus::MissingEvent,
                    "Required parameter `event_type` or `event` is missing. You must add this parameter to your postback URL manually (e.g., `&event_type=registration`).",
                ),
                _ => (
                    ApiStatus::InvalidId,
                    "Required parameter `user_id` or `sub1` is missing or empty. Please check your affiliate panel and use the correct macro.",
                ),
            };
            let response = PostbackResponse {
                success: false,
                status,
                message: message.to_string(),
                outcome: None,
                received_query: Some(query),
            };
            return (StatusCode::BAD_REQUEST, Json(response)).into_response();
        }
        Err(err) => {
            store_failure(&server, &err, "postback", query.player_id());
            let response = PostbackResponse {
                success: false,
                status: ApiStatus::ServerError,
                message: "Internal Server Error".to_string(),
                outcome: None,
                received_query: None,
            };
            return (StatusCode::INTERNAL_SERVER_ERROR, Json(response)).into_response();
        }
    };

    server.metrics().record_postback(&outcome, start.elapsed());
    let response = PostbackResponse {
        success: true,
        status: ApiStatus::from(&outcome),
        message: outcome.message(player.as_str()),
        outcome: Some(outcome),
        received_query: None,
    };
    (StatusCode::OK, Json(response)).into_response()
}

/// Login gate.
pub(super) async fn verify(
    AxumState(server): AxumState<Arc<Server>>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Response {
    let start = Instant::now();
    let query: VerifyQuery = pairs.into_iter().collect();
    match server.funnel().verify(query.player_id.as_deref()).await {
        Ok(gate) => {
            server.metrics().record_gate(gate.status, start.elapsed());
            let status = if gate.status == GateStatus::InvalidId {
                StatusCode::BAD_REQUEST
            } else {
                StatusCode::OK
            };
            (status, Json(VerifyResponse::from(gate))).into_response()
        }
        Err(err) => {
            store_failure(&server, &err, "verify", query.player_id.as_deref());
            let response = VerifyResponse {
                success: false,
                status: ApiStatus::ServerError,
                message: Some(SERVER_ERROR_MESSAGE.to_string()),
                predictions_left: None,
            };
            (StatusCode::INTERNAL_SERVER_ERROR, Json(response)).into_response()
        }
    }
}

/// Spends one prediction and reveals a fresh signal.
pub(super) async fn use_prediction(
    AxumState(server): AxumState<Arc<Server>>,
    Json(request): Json<PlayerRequest>,
) -> Response {
    let start = Instant::now();
    let Some(player) = request
        .player_id
        .as_deref()
        .and_then(|raw| PlayerId::parse(raw).ok())
    else {
        let response = UsePredictionResponse {
            success: false,
            status: ApiStatus::InvalidId,
            predictions_left: None,
            signal: None,
            message: Some("Player ID is required.".to_string()),
        };
        return (StatusCode::BAD_REQUEST, Json(response)).into_response();
    };

    let consumption = match server.funnel().consume(&player).await {
        Ok(consumption) => consumption,
        Err(err) => {
            store_failure(&server, &err, "use_prediction", Some(player.as_str()));
            let response = UsePredictionResponse {
                success: false,
                status: ApiStatus::ServerError,
                predictions_left: None,
                signal: None,
                message: Some("Internal Server Error".to_string()),
            };
            return (StatusCode::INTERNAL_SERVER_ERROR, Json(response)).into_response();
        }
    };
    server.metrics().record_consume(&consumption, start.elapsed());

    let (status, response) = match consumption {
        Consumption::Spent { predictions_left } => (
            StatusCode::OK,
            UsePredictionResponse {
                success: true,
                status: ApiStatus::Consumed,
                predictions_left: Some(predictions_left),
                signal: Some(Signal::draw(&mut rand::thread_rng()).to_string()),
                message: Some(consumption.message().to_string()),
            },
        ),
        Consumption::NotFound => (
            StatusCode::NOT_FOUND,
            UsePredictionResponse {
                success: false,
                status: ApiStatus::NotFound,
                predictions_left: None,
                signal: None,
                message: Some(consumption.message().to_string()),
            },
        ),
        Consumption::NoCredits => (
            StatusCode::BAD_REQUEST,
            UsePredictionResponse {
                success: false,
                status: ApiStatus::NoCredits,
                predictions_left: Some(0),
                signal: None,
                message: Some(consumption.message().to_string()),
            },
        ),
    };
    (status, Json(response)).into_response()
}

fn admin_status_code(check: AdminCheck) -> StatusCode {
    match check {
        AdminCheck::Accepted => StatusCode::OK,
        AdminCheck::Rejected => StatusCode::UNAUTHORIZED,
        AdminCheck::NotConfigured => StatusCode::BAD_REQUEST,
    }
}

pub(super) async fn verify_admin(
    AxumState(server): AxumState<Arc<Server>>,
    Json(request): Json<AdminRequest>,
) -> Response {
    let check = server.funnel().check_admin(request.password.as_deref());
    server.metrics().record_admin(check);
    if check == AdminCheck::NotConfigured {
        tracing::warn!("admin check attempted but no admin password is configured");
    }
    let response = AdminResponse {
        success: check.is_accepted(),
        status: check.into(),
        message: Some(check.message().to_string()),
    };
    (admin_status_code(check), Json(response)).into_response()
}

pub(super) async fn get_promo_code(AxumState(server): AxumState<Arc<Server>>) -> Response {
    match server.funnel().promo_code().await {
        Ok(code) => Json(PromoCodeResponse {
            success: true,
            status: ApiStatus::Ok,
            promo_code: Some(code),
            message: None,
        })
        .into_response(),
        Err(err) => {
            store_failure(&server, &err, "get_promo_code", None);
            let response = PromoCodeResponse {
                success: false,
                status: ApiStatus::ServerError,
                promo_code: Some(DEFAULT_PROMO_CODE.to_string()),
                message: Some("Failed to retrieve promo code from server.".to_string()),
            };
            (StatusCode::INTERNAL_SERVER_ERROR, Json(response)).into_response()
        }
    }
}

pub(super) async fn set_promo_code(
    AxumState(server): AxumState<Arc<Server>>,
    Json(request): Json<SetPromoCodeRequest>,
) -> Response {
    let update = match server
        .funnel()
        .set_promo_code(request.promo_code.as_deref(), request.password.as_deref())
        .await
    {
        Ok(update) => update,
        Err(err) => {
            store_failure(&server, &err, "set_promo_code", None);
            let response = PromoCodeResponse {
                success: false,
                status: ApiStatus::ServerError,
                promo_code: None,
                message: Some("Internal Server Error while saving promo code.".to_string()),
            };
            return (StatusCode::INTERNAL_SERVER_ERROR, Json(response)).into_response();
        }
    };

    let message = Some(update.message());
    let (status_code, response) = match update {
        PromoUpdate::Updated(code) => (
            StatusCode::OK,
            PromoCodeResponse {
                success: true,
                status: ApiStatus::Accepted,
                promo_code: Some(code),
                message,
            },
        ),
        PromoUpdate::Denied(check) => {
            server.metrics().record_admin(check);
            let status_code = match check {
                AdminCheck::NotConfigured => StatusCode::INTERNAL_SERVER_ERROR,
                _ => StatusCode::UNAUTHORIZED,
            };
            (
                status_code,
                PromoCodeResponse {
                    success: false,
                    status: check.into(),
                    promo_code: None,
                    message,
                },
            )
        }
        PromoUpdate::TooShort => (
            StatusCode::BAD_REQUEST,
            PromoCodeResponse {
                success: false,
                status: ApiStatus::InvalidPromoCode,
                promo_code: None,
                message,
            },
        ),
    };
    (status_code, Json(response)).into_response()
}

/// Removes a player's record.
pub(super) async fn clear_user(
    AxumState(server): AxumState<Arc<Server>>,
    Json(request): Json<PlayerRequest>,
) -> Response {
    let Some(player) = request
        .player_id
        .as_deref()
        .and_then(|raw| PlayerId::parse(raw).ok())
    else {
        let response = ClearUserResponse {
            success: false,
            status: ApiStatus::InvalidId,
            message: "Player ID is required in the request body.".to_string(),
        };
        return (StatusCode::BAD_REQUEST, Json(response)).into_response();
    };

    match server.funnel().clear(&player).await {
        Ok(true) => Json(ClearUserResponse {
            success: true,
            status: ApiStatus::Cleared,
            message: format!("Data for player {player} cleared."),
        })
        .into_response(),
        Ok(false) => (
            StatusCode::NOT_FOUND,
            Json(ClearUserResponse {
                success: false,
                status: ApiStatus::NotFound,
                message: format!("No data found for player {player} to clear."),
            }),
        )
            .into_response(),
        Err(err) => {
            store_failure(&server, &err, "clear_user", Some(player.as_str()));
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ClearUserResponse {
                    success: false,
                    status: ApiStatus::ServerError,
                    message: "Internal Server Error".to_string(),
                }),
            )
                .into_response()
        }
    }
}

pub(super) async fn affiliate_link(AxumState(server): AxumState<Arc<Server>>) -> Response {
    match server.funnel().affiliate_link() {
        Some(link) => Json(AffiliateLinkResponse {
            success: true,
            status: ApiStatus::Ok,
            link: Some(link.to_string()),
            message: None,
        })
        .into_response(),
        None => {
            tracing::error!("affiliate link requested but none is configured");
            (
                StatusCode::NOT_FOUND,
                Json(AffiliateLinkResponse {
                    success: false,
                    status: ApiStatus::NotConfigured,
                    link: None,
                    message: Some(
                        "The registration link is not configured correctly. Please contact the site administrator."
                            .to_string(),
                    ),
                }),
            )
                .into_response()
        }
    }
}
