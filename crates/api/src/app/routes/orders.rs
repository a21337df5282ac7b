use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Extension, Path, Query,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};

use storefront_infra::store::InventoryLedger;
use storefront_orders::{OrderDraft, OrderId, OrderQuery, OrderStatus};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_orders).post(create_order))
        .route("/latest", get(latest_orders))
        .route("/summary", get(summary))
        .route("/:id", get(get_order))
        .route("/:id/status", put(update_status))
        .route("/:id/cancel", put(cancel_order))
}

fn parse_order_id(raw: &str) -> Result<OrderId, axum::response::Response> {
    raw.parse().map_err(|_| errors::invalid_id("order"))
}

fn parse_limit(
    query: Result<Query<dto::LimitQuery>, QueryRejection>,
) -> Result<dto::LimitQuery, axum::response::Response> {
    query
        .map(|Query(q)| q)
        .map_err(|e| errors::json_error(StatusCode::BAD_REQUEST, "validation_error", e.body_text()))
}

pub async fn create_order(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<OrderDraft>, JsonRejection>,
) -> axum::response::Response {
    let Json(draft) = match body {
        Ok(b) => b,
        Err(e) => return errors::json_error(StatusCode::BAD_REQUEST, "validation_error", e.body_text()),
    };

    match services.lifecycle.create_order(draft).await {
        Ok(order) => (StatusCode::CREATED, Json(dto::OrderView::from(&order))).into_response(),
        Err(e) => errors::lifecycle_error_to_response(e),
    }
}

pub async fn list_orders(
    Extension(services): Extension<Arc<AppServices>>,
    query: Result<Query<dto::LimitQuery>, QueryRejection>,
) -> axum::response::Response {
    let q = match parse_limit(query) {
        Ok(q) => q,
        Err(resp) => return resp,
    };
    let query = OrderQuery {
        limit: q.limit,
        ..OrderQuery::all()
    };

    match services.lifecycle.list_orders(query).await {
        Ok(orders) => Json(dto::ListResponse {
            items: orders.iter().map(dto::OrderView::from).collect(),
        })
        .into_response(),
        Err(e) => errors::lifecycle_error_to_response(e),
    }
}

pub async fn latest_orders(
    Extension(services): Extension<Arc<AppServices>>,
    query: Result<Query<dto::LimitQuery>, QueryRejection>,
) -> axum::response::Response {
    let q = match parse_limit(query) {
        Ok(q) => q,
        Err(resp) => return resp,
    };
    let n = q.limit.unwrap_or(services.latest_orders_default);

    match services.lifecycle.latest_orders(n).await {
        Ok(orders) => Json(dto::ListResponse {
            items: orders.iter().map(dto::OrderView::from).collect(),
        })
        .into_response(),
        Err(e) => errors::lifecycle_error_to_response(e),
    }
}

pub async fn summary(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.lifecycle.summary().await {
        Ok(s) => Json(s).into_response(),
        Err(e) => errors::lifecycle_error_to_response(e),
    }
}

pub async fn get_order(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_order_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let order = match services.lifecycle.get_order(id).await {
        Ok(o) => o,
        Err(e) => return errors::lifecycle_error_to_response(e),
    };

    // Product details are informational; a lookup failure leaves the line unpopulated.
    let mut products = Vec::with_capacity(order.items().len());
    for item in order.items() {
        let product = match services.ledger().product(item.product_id).await {
            Ok(p) => p.as_ref().map(dto::ProductView::from),
            Err(e) => {
                tracing::warn!(order_id = %id, product_id = %item.product_id, error = %e, "product lookup failed");
                None
            }
        };
        products.push(product);
    }

    let mut products = products.into_iter();
    let view = dto::OrderView::with_products(&order, |_| products.next().flatten());
    Json(view).into_response()
}

pub async fn update_status(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    body: Result<Json<dto::UpdateStatusRequest>, JsonRejection>,
) -> axum::response::Response {
    let id = match parse_order_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return errors::json_error(StatusCode::BAD_REQUEST, "validation_error", e.body_text()),
    };
    let status: OrderStatus = match body.status.parse() {
        Ok(s) => s,
        Err(e) => return errors::json_error(StatusCode::BAD_REQUEST, "validation_error", e.to_string()),
    };

    match services.lifecycle.transition(id, status).await {
        Ok(t) => Json(dto::TransitionView::from(t)).into_response(),
        Err(e) => errors::lifecycle_error_to_response(e),
    }
}

pub async fn cancel_order(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_order_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.lifecycle.cancel(id).await {
        Ok(t) => Json(dto::TransitionView::from(t)).into_response(),
        Err(e) => errors::lifecycle_error_to_response(e),
    }
}
