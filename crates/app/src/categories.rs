use axum::{
    extract::{Path, State},
    response::Response,
    Form,
};
use metrics::counter;
use minijinja::context;
use serde::Deserialize;
use tracing::{info, warn};

use catalog_core::{Category, CategoryDraft, CategoryForm, FieldError, Item};
use catalog_storage::{CategoryDeleteOutcome, NewCategory};

use crate::error::AppError;
use crate::form::{redirect_found, FormPipeline, Persisted};
use crate::router::AppState;
use crate::templates::{linked_categories, linked_items, Linked};

const LIST_PATH: &str = "/categories";

const CREATE: FormPipeline = FormPipeline::new("category", "create");

#[derive(Debug, Deserialize)]
pub struct DeleteCategoryForm {
    #[serde(default)]
    pub categoryid: String,
}

pub async fn list(State(state): State<AppState>) -> Result<Response, AppError> {
    let categories = state.storage().categories().list().await?;
    state.render(
        "category_list.html",
        context! {
            title => "Category List",
            category_list => linked_categories(categories),
        },
    )
}

pub async fn detail(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let (category, category_items) = load_with_items(&state, &id).await?;
    let category = category.ok_or(AppError::NotFound("Category"))?;

    state.render(
        "category_detail.html",
        context! {
            title => "Category Detail",
            category => Linked::category(category),
            category_items => linked_items(category_items),
        },
    )
}

pub async fn create_form(State(state): State<AppState>) -> Result<Response, AppError> {
    render_form(&state, CategoryDraft::default(), Vec::new())
}

pub async fn create(
    State(state): State<AppState>,
    Form(form): Form<CategoryForm>,
) -> Result<Response, AppError> {
    let state = &state;
    CREATE
        .run(
            form.check(),
            move |draft: CategoryDraft| async move {
                let category = state
                    .storage()
                    .categories()
                    .insert(&NewCategory {
                        name: &draft.name,
                        description: &draft.description,
                        created_at: state.now(),
                    })
                    .await?;
                Ok::<_, AppError>(Persisted::Saved {
                    location: category.url(),
                })
            },
            move |draft, errors| async move { render_form(state, draft, errors) },
        )
        .await
}

pub async fn delete_form(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let (category, category_items) = load_with_items(&state, &id).await?;
    let Some(category) = category else {
        return Ok(redirect_found(LIST_PATH));
    };
    render_delete(&state, &category, category_items)
}

/// Deletes a category unless items still reference it.
///
/// A missing category is treated as already deleted. When dependents exist
/// the confirmation view is rendered again with the items that block the
/// removal.
pub async fn delete(
    State(state): State<AppState>,
    Form(form): Form<DeleteCategoryForm>,
) -> Result<Response, AppError> {
    let id = form.categoryid.trim();
    let (category, category_items) = load_with_items(&state, id).await?;
    let Some(category) = category else {
        return Ok(redirect_found(LIST_PATH));
    };

    if !category_items.is_empty() {
        return render_blocked(&state, &category, category_items);
    }

    match state
        .storage()
        .categories()
        .delete_if_unreferenced(id)
        .await?
    {
        CategoryDeleteOutcome::Deleted => {
            info!(stage = "catalog", entity = "category", %id, "category deleted");
            Ok(redirect_found(LIST_PATH))
        }
        CategoryDeleteOutcome::Missing => Ok(redirect_found(LIST_PATH)),
        CategoryDeleteOutcome::Referenced => {
            // An item was attached between the check and the delete.
            let category_items = state.storage().items().list_for_category(id).await?;
            render_blocked(&state, &category, category_items)
        }
    }
}

/// Fetches a category and the items referencing it concurrently.
async fn load_with_items(
    state: &AppState,
    id: &str,
) -> Result<(Option<Category>, Vec<Item>), AppError> {
    let categories = state.storage().categories();
    let items = state.storage().items();
    tokio::try_join!(
        async { categories.find(id).await.map_err(AppError::from) },
        async { items.list_for_category(id).await.map_err(AppError::from) },
    )
}

fn render_form(
    state: &AppState,
    draft: CategoryDraft,
    errors: Vec<FieldError>,
) -> Result<Response, AppError> {
    state.render(
        "category_form.html",
        context! {
            title => "Create Category",
            category => draft,
            errors,
        },
    )
}

fn render_blocked(
    state: &AppState,
    category: &Category,
    category_items: Vec<Item>,
) -> Result<Response, AppError> {
    warn!(
        stage = "catalog",
        entity = "category",
        id = %category.id,
        dependents = category_items.len(),
        "category delete blocked by items"
    );
    counter!("catalog_delete_blocked_total", "entity" => "category").increment(1);
    render_delete(state, category, category_items)
}

fn render_delete(
    state: &AppState,
    category: &Category,
    category_items: Vec<Item>,
) -> Result<Response, AppError> {
    state.render(
        "category_delete.html",
        context! {
            title => "Delete Category",
            category => Linked::category(category.clone()),
            category_items => linked_items(category_items),
        },
    )
}
