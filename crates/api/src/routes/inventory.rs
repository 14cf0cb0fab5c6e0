//! Inventory service endpoints.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use common::{ApiResponse, ProductId};
use domain::messages::{
    CompensateInventoryRequest, InitializeInventoryRequest, InventoryData, UpdateInventoryRequest,
};
use services::InventoryHandler;
use store::Storage;

use crate::error::ApiError;
use crate::extract::require_key;

/// POST /inventory/update — forward step.
pub async fn update<S: Storage + Clone>(
    State(handler): State<InventoryHandler<S>>,
    headers: HeaderMap,
    Json(request): Json<UpdateInventoryRequest>,
) -> Result<Json<ApiResponse<InventoryData>>, ApiError> {
    let key = require_key(&headers)?;
    Ok(Json(handler.update(key, request).await?))
}

/// POST /inventory/compensate — compensation step.
pub async fn compensate<S: Storage + Clone>(
    State(handler): State<InventoryHandler<S>>,
    headers: HeaderMap,
    Json(request): Json<CompensateInventoryRequest>,
) -> Result<Json<ApiResponse<InventoryData>>, ApiError> {
    let key = require_key(&headers)?;
    Ok(Json(handler.compensate(key, request).await?))
}

/// POST /inventory/initialize — set stock for a product.
pub async fn initialize<S: Storage + Clone>(
    State(handler): State<InventoryHandler<S>>,
    Json(request): Json<InitializeInventoryRequest>,
) -> Result<Json<ApiResponse<InventoryData>>, ApiError> {
    Ok(Json(handler.initialize(request).await?))
}

/// GET /inventory/:productId — stock level by product.
pub async fn get<S: Storage + Clone>(
    State(handler): State<InventoryHandler<S>>,
    Path(product_id): Path<String>,
) -> Result<Json<ApiResponse<InventoryData>>, ApiError> {
    Ok(Json(handler.get(&ProductId::new(product_id)).await?))
}
