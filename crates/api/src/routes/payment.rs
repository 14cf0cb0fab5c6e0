//! Payment service endpoints.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use common::{ApiResponse, PaymentId};
use domain::messages::{PaymentData, ProcessPaymentRequest, RefundPaymentRequest};
use services::{PaymentGateway, PaymentHandler};
use store::Storage;
use uuid::Uuid;

use crate::error::ApiError;
use crate::extract::require_key;

/// POST /payment/process — forward step.
pub async fn process<S, G>(
    State(handler): State<PaymentHandler<S, G>>,
    headers: HeaderMap,
    Json(request): Json<ProcessPaymentRequest>,
) -> Result<Json<ApiResponse<PaymentData>>, ApiError>
where
    S: Storage + Clone,
    G: PaymentGateway + Clone,
{
    let key = require_key(&headers)?;
    Ok(Json(handler.process(key, request).await?))
}

/// POST /payment/refund — compensation step.
pub async fn refund<S, G>(
    State(handler): State<PaymentHandler<S, G>>,
    headers: HeaderMap,
    Json(request): Json<RefundPaymentRequest>,
) -> Result<Json<ApiResponse<PaymentData>>, ApiError>
where
    S: Storage + Clone,
    G: PaymentGateway + Clone,
{
    let key = require_key(&headers)?;
    Ok(Json(handler.refund(key, request).await?))
}

/// GET /payment/:paymentId — payment by id.
pub async fn get<S, G>(
    State(handler): State<PaymentHandler<S, G>>,
    Path(payment_id): Path<Uuid>,
) -> Result<Json<ApiResponse<PaymentData>>, ApiError>
where
    S: Storage + Clone,
    G: PaymentGateway + Clone,
{
    Ok(Json(handler.get(PaymentId::from_uuid(payment_id)).await?))
}
