//! Car endpoints
//!
//! Every handler works on the store of the realm resolved for the request.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::db::CarRepo;
use crate::http::error::ApiError;
use crate::http::extractors::{RealmContext, RequestRealm};
use crate::models::{Car, CreateCarRequest, NewCar, Paginated, Pagination, PaginationParams};
use crate::state::AppState;

/// Car response
#[derive(Debug, Serialize)]
pub struct CarResponse {
    pub id: String,
    pub name: String,
    pub created_at: String,
}

impl From<Car> for CarResponse {
    fn from(c: Car) -> Self {
        Self {
            id: c.id,
            name: c.name,
            created_at: c.created_at.to_rfc3339(),
        }
    }
}

/// POST /cars - create a car, never overwriting
///
/// The body is validated before the realm's store is opened.
async fn create_car(
    State(state): State<Arc<AppState>>,
    RequestRealm(realm): RequestRealm,
    Json(req): Json<CreateCarRequest>,
) -> Result<(StatusCode, Json<CarResponse>), ApiError> {
    let car = NewCar::from_request(req)?;
    let ctx = RealmContext::open(&state, realm).await?;
    let car = CarRepo::new(&ctx.store).create(car).await?;

    tracing::debug!(realm = %ctx.realm, car = %car.id, "car created");
    Ok((StatusCode::CREATED, Json(CarResponse::from(car))))
}

/// GET /cars - list cars with pagination
async fn list_cars(
    ctx: RealmContext,
    Query(params): Query<PaginationParams>,
) -> Result<Json<Paginated<CarResponse>>, ApiError> {
    let page = Pagination::from(params);
    let cars = CarRepo::new(&ctx.store).list(page).await?;
    Ok(Json(cars.map(CarResponse::from)))
}

/// GET /cars/{id}
async fn get_car(
    ctx: RealmContext,
    Path(id): Path<String>,
) -> Result<Json<CarResponse>, ApiError> {
    let car = CarRepo::new(&ctx.store).get(&id).await?;
    Ok(Json(CarResponse::from(car)))
}

/// DELETE /cars/{id}
async fn delete_car(ctx: RealmContext, Path(id): Path<String>) -> Result<StatusCode, ApiError> {
    CarRepo::new(&ctx.store).delete(&id).await?;

    tracing::debug!(realm = %ctx.realm, car = %id, "car deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Car routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/cars", get(list_cars).post(create_car))
        .route("/cars/", post(create_car))
        .route("/cars/{id}", get(get_car).delete(delete_car))
}
