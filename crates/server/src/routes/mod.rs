use axum::{Router, middleware::from_fn_with_state};
use serde::Deserialize;
use uuid::Uuid;

use crate::{AppState, middleware::require_auth};

pub mod attendance;
pub mod auth;
pub mod categories;
pub mod health;
pub mod obras;
pub mod positions;
pub mod products;
pub mod purchase_orders;
pub mod quotations;
pub mod requirements;
pub mod roles;
pub mod trainings;
pub mod users;
pub mod workers;

/// `?obra_id=` narrowing for lists of obra-owned documents
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ObraFilter {
    pub obra_id: Option<Uuid>,
}

pub fn router(state: &AppState) -> Router<AppState> {
    let protected = Router::new()
        .merge(auth::router())
        .merge(categories::router())
        .merge(products::router())
        .merge(obras::router())
        .merge(positions::router())
        .merge(workers::router())
        .merge(requirements::router())
        .merge(purchase_orders::router())
        .merge(attendance::router())
        .merge(trainings::router())
        .merge(quotations::router())
        .merge(users::router())
        .merge(roles::router())
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(health::router())
        .merge(auth::public_router())
        .merge(protected)
}
