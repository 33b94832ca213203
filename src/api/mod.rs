use std::sync::Arc;

use actix_web::error::InternalError;
use actix_web::{web, HttpResponse, Responder, ResponseError};
use tracing::Instrument;
use uuid::Uuid;

use crate::error::OrderError;
use crate::metrics::Metrics;
use crate::models::CreateOrderRequest;
use crate::service::OrderService;

// ============================================================================
// HTTP Surface
// ============================================================================
//
// POST /         create an order
// GET  /         list orders, newest first
// GET  /health   liveness probe
// GET  /metrics  Prometheus text exposition
// GET  /{id}     fetch one order
//
// `/{id}` is registered last so the fixed paths keep their meaning.
// ============================================================================

pub struct AppState {
    pub service: OrderService,
    pub metrics: Arc<Metrics>,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/")
            .route(web::post().to(create_order))
            .route(web::get().to(list_orders)),
    )
    .route("/health", web::get().to(health))
    .route("/metrics", web::get().to(metrics))
    .route("/{id}", web::get().to(get_order));
}

/// Map body extraction failures onto the same shape validation errors use.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        let response = OrderError::InvalidInput("invalid request body").error_response();
        InternalError::from_response(err, response).into()
    })
}

async fn create_order(
    state: web::Data<AppState>,
    body: web::Json<CreateOrderRequest>,
) -> Result<HttpResponse, OrderError> {
    let request_id = Uuid::new_v4();
    let order = state
        .service
        .create_order(body.into_inner())
        .instrument(tracing::info_span!("create_order", request_id = %request_id))
        .await?;

    Ok(HttpResponse::Created().json(order))
}

async fn list_orders(state: web::Data<AppState>) -> Result<HttpResponse, OrderError> {
    let orders = state.service.list_orders().await?;
    Ok(HttpResponse::Ok().json(orders))
}

async fn get_order(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, OrderError> {
    // A non-numeric id cannot name any order.
    let id: i64 = path.into_inner().parse().map_err(|_| OrderError::NotFound)?;
    let order = state.service.get_order(id).await?;
    Ok(HttpResponse::Ok().json(order))
}

async fn health() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "order-service"
    }))
}

async fn metrics(state: web::Data<AppState>) -> HttpResponse {
    match state.metrics.render() {
        Ok(body) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(body),
        Err(e) => {
            tracing::error!(error = %e, "metrics encoding failed");
            HttpResponse::InternalServerError().finish()
        }
    }
}
