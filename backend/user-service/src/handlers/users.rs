//! HTTP endpoints for the user aggregate.

use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde::Deserialize;

use crate::db::UserRepository;
use crate::error::{AppError, Result};
use crate::services::{UpdateUser, UserService};

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
}

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

pub async fn create_user(
    service: web::Data<UserService>,
    req: web::Json<CreateUserRequest>,
) -> Result<HttpResponse> {
    let name = req.name.trim();
    let email = req.email.trim();
    if name.is_empty() || email.is_empty() {
        return Err(AppError::Validation("name and email are required".into()));
    }

    let user = service.create_user(name, email).await?;
    Ok(HttpResponse::Created().json(user))
}

pub async fn update_user(
    service: web::Data<UserService>,
    id: web::Path<u64>,
    req: web::Json<UpdateUserRequest>,
) -> Result<HttpResponse> {
    let req = req.into_inner();
    if req.name.is_none() && req.email.is_none() {
        return Err(AppError::Validation("nothing to update".into()));
    }

    let user = service
        .update_user(
            *id,
            UpdateUser {
                name: req.name,
                email: req.email,
            },
        )
        .await?;
    Ok(HttpResponse::Ok().json(user))
}

pub async fn get_user(repo: web::Data<UserRepository>, id: web::Path<u64>) -> Result<HttpResponse> {
    let user = repo.get_by_id(*id).await?;
    Ok(HttpResponse::Ok().json(user))
}

pub async fn list_users(repo: web::Data<UserRepository>) -> Result<HttpResponse> {
    let users = repo.list().await?;
    Ok(HttpResponse::Ok().json(users))
}
