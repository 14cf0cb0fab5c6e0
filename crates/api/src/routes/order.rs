//! Order service endpoints.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use common::{ApiResponse, OrderId};
use domain::messages::{CompensateOrderRequest, OrderData, StartOrderData, StartOrderRequest};
use services::OrderHandler;
use store::Storage;
use uuid::Uuid;

use crate::error::ApiError;
use crate::extract::{optional_key, require_uuid_key};

/// POST /order/start — initiate a saga.
pub async fn start<S: Storage + Clone>(
    State(handler): State<OrderHandler<S>>,
    headers: HeaderMap,
    Json(request): Json<StartOrderRequest>,
) -> Result<Json<ApiResponse<StartOrderData>>, ApiError> {
    let key = require_uuid_key(&headers)?;
    Ok(Json(handler.start(key, request).await?))
}

/// POST /order/compensate — final backward step.
pub async fn compensate<S: Storage + Clone>(
    State(handler): State<OrderHandler<S>>,
    headers: HeaderMap,
    Json(request): Json<CompensateOrderRequest>,
) -> Result<Json<ApiResponse<OrderData>>, ApiError> {
    let key = optional_key(&headers);
    Ok(Json(handler.compensate(key, request).await?))
}

/// GET /order/:orderId — order by id.
pub async fn get<S: Storage + Clone>(
    State(handler): State<OrderHandler<S>>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<ApiResponse<OrderData>>, ApiError> {
    Ok(Json(handler.get(OrderId::from_uuid(order_id)).await?))
}
