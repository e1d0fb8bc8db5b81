use axum::{
    extract::{Path, State},
    response::Response,
    Form,
};
use minijinja::context;
use serde::Deserialize;
use tracing::info;

use catalog_core::{FieldError, Item, ItemDraft, ItemForm};
use catalog_storage::{ItemError, NewItem};

use crate::error::AppError;
use crate::form::{redirect_found, FormPipeline, Persisted};
use crate::router::AppState;

const LIST_PATH: &str = "/items";

const CREATE: FormPipeline = FormPipeline::new("item", "create");
const UPDATE: FormPipeline = FormPipeline::new("item", "update");

const CREATE_TITLE: &str = "Create Item";
const UPDATE_TITLE: &str = "Update Item";

/// Reported when the selected category vanished before the item was saved.
const UNKNOWN_CATEGORY: FieldError = FieldError::new("category", "Category must exist.");

#[derive(Debug, Deserialize)]
pub struct DeleteItemForm {
    #[serde(default)]
    pub itemid: String,
}

pub async fn list(State(state): State<AppState>) -> Result<Response, AppError> {
    let items = state.storage().items().list_resolved().await?;
    state.render(
        "item_list.html",
        context! {
            title => "Item List",
            item_list => items,
        },
    )
}

pub async fn detail(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let item = state
        .storage()
        .items()
        .find_resolved(&id)
        .await?
        .ok_or(AppError::NotFound("Item"))?;

    state.render(
        "item_detail.html",
        context! {
            title => "Item Detail",
            item,
        },
    )
}

pub async fn create_form(State(state): State<AppState>) -> Result<Response, AppError> {
    render_form(&state, CREATE_TITLE, ItemDraft::default(), Vec::new()).await
}

pub async fn create(
    State(state): State<AppState>,
    Form(form): Form<ItemForm>,
) -> Result<Response, AppError> {
    let state = &state;
    CREATE
        .run(
            form.check(),
            move |draft: ItemDraft| async move {
                let saved = state
                    .storage()
                    .items()
                    .insert(&new_item(&draft, state))
                    .await;
                match saved {
                    Ok(item) => Ok(Persisted::Saved {
                        location: item.url(),
                    }),
                    Err(ItemError::UnknownCategory) => Ok(Persisted::Refused(UNKNOWN_CATEGORY)),
                    Err(err) => Err(AppError::from(err)),
                }
            },
            move |draft, errors| render_form(state, CREATE_TITLE, draft, errors),
        )
        .await
}

pub async fn update_form(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let items = state.storage().items();
    let categories = state.storage().categories();
    let (item, categories) = tokio::try_join!(
        async { items.find(&id).await.map_err(AppError::from) },
        async { categories.list().await.map_err(AppError::from) },
    )?;
    let item = item.ok_or(AppError::NotFound("Item"))?;

    state.render(
        "item_form.html",
        context! {
            title => UPDATE_TITLE,
            categories,
            item => draft_of(item),
            errors => Vec::<FieldError>::new(),
        },
    )
}

/// Overwrites an existing item; the identifier in the path is kept.
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Form(form): Form<ItemForm>,
) -> Result<Response, AppError> {
    let state = &state;
    let id = id.as_str();
    UPDATE
        .run(
            form.check(),
            move |draft: ItemDraft| async move {
                let saved = state
                    .storage()
                    .items()
                    .update(id, &new_item(&draft, state))
                    .await;
                match saved {
                    Ok(Some(item)) => Ok(Persisted::Saved {
                        location: item.url(),
                    }),
                    Ok(None) => Err(AppError::NotFound("Item")),
                    Err(ItemError::UnknownCategory) => Ok(Persisted::Refused(UNKNOWN_CATEGORY)),
                    Err(err) => Err(AppError::from(err)),
                }
            },
            move |draft, errors| render_form(state, UPDATE_TITLE, draft, errors),
        )
        .await
}

pub async fn delete_form(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let Some(item) = state.storage().items().find_resolved(&id).await? else {
        return Ok(redirect_found(LIST_PATH));
    };

    state.render(
        "item_delete.html",
        context! {
            title => "Delete Item",
            item,
        },
    )
}

/// Removes an item. Items have no dependents, so this never blocks.
pub async fn delete(
    State(state): State<AppState>,
    Form(form): Form<DeleteItemForm>,
) -> Result<Response, AppError> {
    let id = form.itemid.trim();
    if state.storage().items().delete(id).await? {
        info!(stage = "catalog", entity = "item", %id, "item deleted");
    }
    Ok(redirect_found(LIST_PATH))
}

fn new_item<'a>(draft: &'a ItemDraft, state: &AppState) -> NewItem<'a> {
    NewItem {
        name: &draft.name,
        category_id: &draft.category,
        description: &draft.description,
        stock: &draft.stock,
        recorded_at: state.now(),
    }
}

fn draft_of(item: Item) -> ItemDraft {
    ItemDraft {
        name: item.name,
        category: item.category_id,
        description: item.description,
        stock: item.stock,
    }
}

/// Renders the item form. The category choices are loaded on every call so
/// a re-rendered form never offers stale categories.
async fn render_form(
    state: &AppState,
    title: &'static str,
    draft: ItemDraft,
    errors: Vec<FieldError>,
) -> Result<Response, AppError> {
    let categories = state.storage().categories().list().await?;
    state.render(
        "item_form.html",
        context! {
            title,
            categories,
            item => draft,
            errors,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use catalog_core::Category;
    use catalog_storage::NewCategory;

    use crate::router::test_support::*;

    async fn insert_category(state: &AppState, name: &str) -> Category {
        state
            .storage()
            .categories()
            .insert(&NewCategory {
                name,
                description: "details",
                created_at: fixed_time(),
            })
            .await
            .expect("insert category")
    }

    async fn insert_item(state: &AppState, name: &str, category_id: &str) -> Item {
        state
            .storage()
            .items()
            .insert(&NewItem {
                name,
                category_id,
                description: "details",
                stock: "1",
                recorded_at: fixed_time(),
            })
            .await
            .expect("insert item")
    }

    async fn item_count(state: &AppState) -> u64 {
        state.storage().items().count().await.expect("count")
    }

    #[tokio::test]
    async fn create_persists_and_redirects_to_detail() {
        let state = setup_state().await;
        let tools = insert_category(&state, "Tools").await;

        let response = post_form(
            &state,
            "/items/create",
            &[
                ("name", "Hammer"),
                ("category", tools.id.as_str()),
                ("description", "Claw hammer"),
                ("stock", " 5 "),
            ],
        )
        .await;

        assert_eq!(response.status(), StatusCode::FOUND);
        let stored = state.storage().items().list_for_category(&tools.id).await.expect("list");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].stock, "5");
        assert_eq!(location(&response), format!("/items/{}", stored[0].id));
    }

    #[tokio::test]
    async fn empty_description_re_renders_with_values() {
        let state = setup_state().await;
        let tools = insert_category(&state, "Tools").await;

        let response = post_form(
            &state,
            "/items/create",
            &[
                ("name", "Hammer"),
                ("category", tools.id.as_str()),
                ("description", ""),
                ("stock", "5"),
            ],
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        assert!(body.contains("data-field=\"description\""));
        assert!(body.contains("Description must not be empty."));
        assert!(!body.contains("data-field=\"name\""));
        assert!(body.contains("value=\"Hammer\""));
        assert!(body.contains("value=\"5\""));
        assert!(body.contains(&format!("value=\"{}\" selected", tools.id)));
        assert_eq!(item_count(&state).await, 0);
    }

    #[tokio::test]
    async fn rejected_form_offers_current_categories() {
        let state = setup_state().await;
        insert_category(&state, "Tools").await;
        insert_category(&state, "Garden").await;

        let response = post_form(&state, "/items/create", &[("name", "Hammer")]).await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        assert!(body.contains(">Tools</option>"));
        assert!(body.contains(">Garden</option>"));
        for field in ["category", "description", "stock"] {
            assert!(body.contains(&format!("data-field=\"{field}\"")), "{field}");
        }
    }

    #[tokio::test]
    async fn unknown_category_is_reported_on_the_form() {
        let state = setup_state().await;

        let response = post_form(
            &state,
            "/items/create",
            &[
                ("name", "Hammer"),
                ("category", "missing"),
                ("description", "Claw hammer"),
                ("stock", "5"),
            ],
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        assert!(body.contains("Category must exist."));
        assert_eq!(item_count(&state).await, 0);
    }

    #[tokio::test]
    async fn list_and_detail_resolve_category() {
        let state = setup_state().await;
        let tools = insert_category(&state, "Tools").await;
        let hammer = insert_item(&state, "Hammer", &tools.id).await;

        let body = body_text(get(&state, "/items").await).await;
        assert!(body.contains(&format!("href=\"{}\">Hammer", hammer.url())));
        assert!(body.contains(&format!("href=\"{}\">Tools", tools.url())));

        let response = get(&state, &hammer.url()).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        assert!(body.contains(&format!("href=\"{}\">Tools", tools.url())));
        assert!(body.contains("<strong>Stock:</strong> 1"));
    }

    #[tokio::test]
    async fn detail_of_missing_item_is_not_found() {
        let state = setup_state().await;
        let response = get(&state, "/items/missing").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn update_form_is_prefilled() {
        let state = setup_state().await;
        let tools = insert_category(&state, "Tools").await;
        let hammer = insert_item(&state, "Hammer", &tools.id).await;

        let response = get(&state, &format!("{}/update", hammer.url())).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        assert!(body.contains("<title>Update Item</title>"));
        assert!(body.contains("value=\"Hammer\""));
        assert!(body.contains(&format!("value=\"{}\" selected", tools.id)));

        let response = get(&state, "/items/missing/update").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn update_keeps_identifier_and_count() {
        let state = setup_state().await;
        let tools = insert_category(&state, "Tools").await;
        let garden = insert_category(&state, "Garden").await;
        let item = insert_item(&state, "Hammer", &tools.id).await;

        let response = post_form(
            &state,
            &format!("{}/update", item.url()),
            &[
                ("name", "Rake"),
                ("category", garden.id.as_str()),
                ("description", "Leaf rake"),
                ("stock", "3"),
            ],
        )
        .await;

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(location(&response), item.url());
        assert_eq!(item_count(&state).await, 1);

        let stored = state
            .storage()
            .items()
            .find(&item.id)
            .await
            .expect("find")
            .expect("item present");
        assert_eq!(stored.name, "Rake");
        assert_eq!(stored.category_id, garden.id);
    }

    #[tokio::test]
    async fn invalid_update_leaves_item_untouched() {
        let state = setup_state().await;
        let tools = insert_category(&state, "Tools").await;
        let item = insert_item(&state, "Hammer", &tools.id).await;

        let response = post_form(
            &state,
            &format!("{}/update", item.url()),
            &[("name", " "), ("category", tools.id.as_str()), ("description", "x"), ("stock", "2")],
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        assert!(body.contains("<title>Update Item</title>"));
        assert!(body.contains("Name must not be empty."));

        let stored = state
            .storage()
            .items()
            .find(&item.id)
            .await
            .expect("find")
            .expect("item present");
        assert_eq!(stored, item);
    }

    #[tokio::test]
    async fn update_of_missing_item_is_not_found() {
        let state = setup_state().await;
        let tools = insert_category(&state, "Tools").await;

        let response = post_form(
            &state,
            "/items/missing/update",
            &[
                ("name", "Rake"),
                ("category", tools.id.as_str()),
                ("description", "Leaf rake"),
                ("stock", "3"),
            ],
        )
        .await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(item_count(&state).await, 0);
    }

    #[tokio::test]
    async fn delete_is_unconditional() {
        let state = setup_state().await;
        let tools = insert_category(&state, "Tools").await;
        let item = insert_item(&state, "Hammer", &tools.id).await;

        let response = get(&state, &format!("{}/delete", item.url())).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("name=\"itemid\""));

        let response = post_form(&state, "/items/delete", &[("itemid", item.id.as_str())]).await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(location(&response), "/items");
        assert_eq!(item_count(&state).await, 0);

        let response = post_form(&state, "/items/delete", &[("itemid", item.id.as_str())]).await;
        assert_eq!(response.status(), StatusCode::FOUND);

        let response = get(&state, &format!("{}/delete", item.url())).await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(location(&response), "/items");
    }
}
