//! HTTP endpoints for the order aggregate.

use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::db::{OrderRepository, OrderWithItems};
use crate::error::{AppError, Result};
use crate::models::{NewOrderItem, Order, OrderItem};
use crate::services::OrderService;

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub user_id: u64,
    pub items: Vec<CreateOrderItem>,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderItem {
    pub product_id: u64,
    pub quantity: i32,
    pub unit_price: f64,
}

#[derive(Debug, Deserialize, Default)]
pub struct CancelOrderRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

pub async fn create_order(
    service: web::Data<OrderService>,
    req: web::Json<CreateOrderRequest>,
) -> Result<HttpResponse> {
    let req = req.into_inner();
    if req.items.is_empty() {
        return Err(AppError::Validation("order must have at least one item".into()));
    }
    for item in &req.items {
        if item.quantity <= 0 {
            return Err(AppError::Validation(format!(
                "quantity for product {} must be positive",
                item.product_id
            )));
        }
        if item.unit_price < 0.0 {
            return Err(AppError::Validation(format!(
                "unit price for product {} cannot be negative",
                item.product_id
            )));
        }
    }

    let items = req
        .items
        .into_iter()
        .map(|item| NewOrderItem {
            product_id: item.product_id,
            quantity: item.quantity,
            unit_price: item.unit_price,
        })
        .collect();

    let (order, items) = service.create_order(req.user_id, items).await?;
    Ok(HttpResponse::Created().json(OrderResponse { order, items }))
}

pub async fn pay_order(service: web::Data<OrderService>, id: web::Path<u64>) -> Result<HttpResponse> {
    let order = service.pay_order(*id).await?;
    Ok(HttpResponse::Ok().json(order))
}

pub async fn cancel_order(
    service: web::Data<OrderService>,
    id: web::Path<u64>,
    req: Option<web::Json<CancelOrderRequest>>,
) -> Result<HttpResponse> {
    let reason = req.and_then(|r| r.into_inner().reason);
    let order = service.cancel_order(*id, reason).await?;
    Ok(HttpResponse::Ok().json(order))
}

pub async fn get_order(
    repo: web::Data<OrderRepository>,
    id: web::Path<u64>,
) -> Result<HttpResponse> {
    let OrderWithItems { order, items } = repo.get_by_id(*id).await?;
    Ok(HttpResponse::Ok().json(OrderResponse { order, items }))
}

pub async fn list_orders(repo: web::Data<OrderRepository>) -> Result<HttpResponse> {
    let orders = repo.list().await?;
    Ok(HttpResponse::Ok().json(orders))
}
