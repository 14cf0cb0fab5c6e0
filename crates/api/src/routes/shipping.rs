//! Shipping service endpoints.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use common::{ApiResponse, ShipmentId};
use domain::messages::{CancelShipmentRequest, DeliverOrderRequest, ShipmentData};
use services::ShippingHandler;
use store::Storage;
use uuid::Uuid;

use crate::error::ApiError;
use crate::extract::require_key;

/// POST /shipping/deliver — final forward step.
pub async fn deliver<S: Storage + Clone>(
    State(handler): State<ShippingHandler<S>>,
    headers: HeaderMap,
    Json(request): Json<DeliverOrderRequest>,
) -> Result<Json<ApiResponse<ShipmentData>>, ApiError> {
    let key = require_key(&headers)?;
    Ok(Json(handler.deliver(key, request).await?))
}

/// POST /shipping/cancel — compensation step.
pub async fn cancel<S: Storage + Clone>(
    State(handler): State<ShippingHandler<S>>,
    headers: HeaderMap,
    Json(request): Json<CancelShipmentRequest>,
) -> Result<Json<ApiResponse<ShipmentData>>, ApiError> {
    let key = require_key(&headers)?;
    Ok(Json(handler.cancel(key, request).await?))
}

/// GET /shipping/:shippingId — shipment by id.
pub async fn get<S: Storage + Clone>(
    State(handler): State<ShippingHandler<S>>,
    Path(shipping_id): Path<Uuid>,
) -> Result<Json<ApiResponse<ShipmentData>>, ApiError> {
    Ok(Json(handler.get(ShipmentId::from_uuid(shipping_id)).await?))
}
