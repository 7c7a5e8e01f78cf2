//! HTTP endpoints for the product aggregate.

use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;

use crate::db::ProductRepository;
use crate::error::{AppError, Result};
use crate::services::{ProductService, UpdateProduct};

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub price: f64,
    pub stock: i32,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub price: Option<f64>,
    pub stock: Option<i32>,
}

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

pub async fn create_product(
    service: web::Data<ProductService>,
    req: web::Json<CreateProductRequest>,
) -> Result<HttpResponse> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("name is required".into()));
    }
    if req.price < 0.0 {
        return Err(AppError::Validation("price cannot be negative".into()));
    }
    if req.stock < 0 {
        return Err(AppError::Validation("stock cannot be negative".into()));
    }

    let product = service.create_product(name, req.price, req.stock).await?;
    Ok(HttpResponse::Created().json(product))
}

pub async fn update_product(
    service: web::Data<ProductService>,
    id: web::Path<u64>,
    req: web::Json<UpdateProductRequest>,
) -> Result<HttpResponse> {
    let req = req.into_inner();
    if req.name.is_none() && req.price.is_none() && req.stock.is_none() {
        return Err(AppError::Validation("nothing to update".into()));
    }

    let product = service
        .update_product(
            *id,
            UpdateProduct {
                name: req.name,
                price: req.price,
                stock: req.stock,
            },
        )
        .await?;
    Ok(HttpResponse::Ok().json(product))
}

pub async fn get_product(
    repo: web::Data<Arc<ProductRepository>>,
    id: web::Path<u64>,
) -> Result<HttpResponse> {
    let product = repo.get_by_id(*id).await?;
    Ok(HttpResponse::Ok().json(product))
}

pub async fn list_products(repo: web::Data<Arc<ProductRepository>>) -> Result<HttpResponse> {
    let products = repo.list().await?;
    Ok(HttpResponse::Ok().json(products))
}
