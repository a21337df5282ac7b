use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use storefront_infra::store::{InventoryLedger, ProductCatalog};
use storefront_inventory::{Product, ProductId};

use crate::app::{dto, errors};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_product))
        .route("/:id", get(get_product).delete(remove_product))
}

pub async fn create_product(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::CreateProductRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return errors::json_error(StatusCode::BAD_REQUEST, "validation_error", e.body_text()),
    };

    let id = match body.id.as_deref() {
        Some(raw) => match raw.parse::<ProductId>() {
            Ok(id) => id,
            Err(_) => return errors::invalid_id("product"),
        },
        None => ProductId::generate(),
    };

    let product = match Product::new(id, body.name, body.stock) {
        Ok(p) => p,
        Err(e) => return errors::json_error(StatusCode::BAD_REQUEST, "validation_error", e.to_string()),
    };

    match services.catalog.register(product).await {
        Ok(p) => {
            tracing::info!(product_id = %p.id_typed(), stock = p.stock(), "product registered");
            (StatusCode::CREATED, Json(dto::ProductView::from(&p))).into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn get_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: ProductId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("product"),
    };

    match services.ledger().product(id).await {
        Ok(Some(p)) => Json(dto::ProductView::from(&p)).into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "product not found"),
        Err(e) => errors::store_error_to_response(e),
    }
}

/// Delist a product. Stock history stays; later completions that reference it
/// skip the decrement.
pub async fn remove_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: ProductId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("product"),
    };

    match services.catalog.remove(id).await {
        Ok(()) => {
            tracing::info!(product_id = %id, "product removed");
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}
