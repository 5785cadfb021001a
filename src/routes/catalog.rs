use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;

use crate::api::AppContext;
use crate::error::DemoAccessError;
use crate::models::app::App;
use crate::models::testimonial::Testimonial;

#[derive(Debug, Deserialize)]
pub struct CatalogFilter {
    pub category: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/apps",
    tag = "Catalog",
    params(
        ("category" = Option<String>, Query, description = "Filter by category")
    ),
    responses(
        (status = 200, description = "Active apps, optionally filtered by category", body = [App]),
    )
)]
pub async fn list_apps(
    State(context): State<AppContext>,
    Query(filter): Query<CatalogFilter>,
) -> Result<Json<Vec<App>>, DemoAccessError> {
    let apps = match filter.category.as_deref().filter(|c| !c.is_empty()) {
        Some(category) => context.storage.apps_by_category(category).await?,
        None => context.storage.apps().await?,
    };
    Ok(Json(apps))
}

#[utoipa::path(
    get,
    path = "/api/apps/{id}",
    tag = "Catalog",
    params(
        ("id" = String, Path, description = "App id")
    ),
    responses(
        (status = 200, description = "App detail", body = App),
        (status = 404, description = "No such app"),
    )
)]
pub async fn get_app(
    State(context): State<AppContext>,
    Path(id): Path<String>,
) -> Result<Json<App>, DemoAccessError> {
    let app = context
        .storage
        .app(&id)
        .await?
        .ok_or(DemoAccessError::AppNotFound)?;
    Ok(Json(app))
}

#[utoipa::path(
    get,
    path = "/api/testimonials",
    tag = "Catalog",
    responses(
        (status = 200, description = "Approved testimonials", body = [Testimonial]),
    )
)]
pub async fn list_testimonials(
    State(context): State<AppContext>,
) -> Result<Json<Vec<Testimonial>>, DemoAccessError> {
    let testimonials = context.storage.testimonials().await?;
    Ok(Json(testimonials))
}
