use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use minijinja::{context, Value};
use catalog_storage::Database;

use crate::error::AppError;
use crate::templates::Templates;
use crate::{categories, items, telemetry};

#[derive(Clone)]
pub struct AppState {
    metrics: PrometheusHandle,
    storage: Database,
    templates: Arc<Templates>,
    clock: Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>,
}

impl AppState {
    pub fn new(metrics: PrometheusHandle, storage: Database, templates: Arc<Templates>) -> Self {
        Self {
            metrics,
            storage,
            templates,
            clock: Arc::new(Utc::now),
        }
    }

    #[cfg(test)]
    pub fn with_clock(mut self, clock: Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>) -> Self {
        self.clock = clock;
        self
    }

    pub fn metrics(&self) -> &PrometheusHandle {
        &self.metrics
    }

    pub fn storage(&self) -> &Database {
        &self.storage
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    /// Renders `template` into an HTML response.
    pub fn render(&self, template: &str, context: Value) -> Result<Response, AppError> {
        Ok(self.templates.render(template, context)?.into_response())
    }
}

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .route("/categories", get(categories::list))
        .route(
            "/categories/create",
            get(categories::create_form).post(categories::create),
        )
        .route("/categories/delete", post(categories::delete))
        .route("/categories/:id", get(categories::detail))
        .route("/categories/:id/delete", get(categories::delete_form))
        .route("/items", get(items::list))
        .route("/items/create", get(items::create_form).post(items::create))
        .route("/items/delete", post(items::delete))
        .route("/items/:id", get(items::detail))
        .route(
            "/items/:id/update",
            get(items::update_form).post(items::update),
        )
        .route("/items/:id/delete", get(items::delete_form))
        .with_state(state)
}

async fn index(State(state): State<AppState>) -> Result<Response, AppError> {
    let categories = state.storage().categories();
    let items = state.storage().items();
    let (category_count, item_count) = tokio::try_join!(
        async { categories.count().await.map_err(AppError::from) },
        async { items.count().await.map_err(AppError::from) },
    )?;

    state.render(
        "index.html",
        context! {
            title => "Inventory Catalog",
            category_count,
            item_count,
        },
    )
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let body = telemetry::render_metrics(state.metrics());
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        Body::from(body),
    )
}


#[cfg(test)]
mod tests {
    use super::test_support::{body_text, fixed_time, get, setup_state};
    use super::*;
    use catalog_storage::NewCategory;

    #[tokio::test]
    async fn healthz_returns_ok() {
        let state = setup_state().await;
        let response = get(&state, "/healthz").await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn metrics_exports_build_info() {
        let state = setup_state().await;
        let response = get(&state, "/metrics").await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        assert!(body.contains("app_build_info"));
        assert!(body.contains("app_uptime_seconds"));
    }

    #[tokio::test]
    async fn index_reports_record_counts() {
        let state = setup_state().await;
        state
            .storage()
            .categories()
            .insert(&NewCategory {
                name: "Tools",
                description: "Hand tools",
                created_at: fixed_time(),
            })
            .await
            .expect("insert");

        let response = get(&state, "/").await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        assert!(body.contains("<strong>Categories:</strong> 1"));
        assert!(body.contains("<strong>Items:</strong> 0"));
    }

    #[tokio::test]
    async fn unknown_paths_are_not_found() {
        let state = setup_state().await;
        let response = get(&state, "/nowhere").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
