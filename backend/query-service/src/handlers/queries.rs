//! Read-only HTTP endpoints over the projection views.

use std::sync::Arc;

use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde::Deserialize;

use crate::dto::{OrderResponse, ProductResponse, UserResponse};
use crate::error::{AppError, Result};
use crate::projections::{OrderProjection, ProductProjection, UserProjection};

#[derive(Debug, Deserialize)]
pub struct OrdersQuery {
    pub user_id: Option<i64>,
    pub status: Option<String>,
}

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

pub async fn list_users(users: web::Data<Arc<UserProjection>>) -> Result<HttpResponse> {
    let views = users.list().await?;
    let response: Vec<UserResponse> = views.into_iter().map(UserResponse::from).collect();
    Ok(HttpResponse::Ok().json(response))
}

pub async fn get_user(
    users: web::Data<Arc<UserProjection>>,
    id: web::Path<i64>,
) -> Result<HttpResponse> {
    match users.get_by_id(*id).await? {
        Some(view) => Ok(HttpResponse::Ok().json(UserResponse::from(view))),
        None => Err(AppError::NotFound {
            kind: "user",
            id: *id,
        }),
    }
}

pub async fn list_products(products: web::Data<Arc<ProductProjection>>) -> Result<HttpResponse> {
    let views = products.list().await?;
    let response: Vec<ProductResponse> = views.into_iter().map(ProductResponse::from).collect();
    Ok(HttpResponse::Ok().json(response))
}

pub async fn get_product(
    products: web::Data<Arc<ProductProjection>>,
    id: web::Path<i64>,
) -> Result<HttpResponse> {
    match products.get_by_id(*id).await? {
        Some(view) => Ok(HttpResponse::Ok().json(ProductResponse::from(view))),
        None => Err(AppError::NotFound {
            kind: "product",
            id: *id,
        }),
    }
}

pub async fn list_orders(
    orders: web::Data<Arc<OrderProjection>>,
    query: web::Query<OrdersQuery>,
) -> Result<HttpResponse> {
    let views = orders
        .list(query.user_id, query.status.as_deref())
        .await?;
    let response: Vec<OrderResponse> = views.into_iter().map(OrderResponse::from).collect();
    Ok(HttpResponse::Ok().json(response))
}

pub async fn get_order(
    orders: web::Data<Arc<OrderProjection>>,
    id: web::Path<i64>,
) -> Result<HttpResponse> {
    match orders.get_by_id(*id).await? {
        Some(view) => Ok(HttpResponse::Ok().json(OrderResponse::from(view))),
        None => Err(AppError::NotFound {
            kind: "order",
            id: *id,
        }),
    }
}
