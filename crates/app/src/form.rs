//! Shared create/update flow for entity forms.
//!
//! A checked [`Submission`] either goes back to the user through the
//! `reject` step (the form re-rendered with every field error) or is handed
//! to the `persist` step, which performs exactly one write. A successful
//! write ends in a `302 Found` to the entity's detail page; store failures
//! propagate to the error boundary untouched.

use std::future::Future;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use metrics::counter;
use tracing::{debug, info, warn};

use catalog_core::{FieldError, Submission};

use crate::error::AppError;

/// Result of a persist step that reached the store.
#[derive(Debug)]
pub enum Persisted {
    /// The record was written; redirect to `location`.
    Saved { location: String },
    /// The store refused the values because of one field.
    Refused(FieldError),
}

/// One form flow, labelled for logs and metrics.
#[derive(Debug, Clone, Copy)]
pub struct FormPipeline {
    entity: &'static str,
    action: &'static str,
}

impl FormPipeline {
    pub const fn new(entity: &'static str, action: &'static str) -> Self {
        Self { entity, action }
    }

    pub async fn run<D, P, PFut, R, RFut>(
        self,
        submission: Submission<D>,
        persist: P,
        reject: R,
    ) -> Result<Response, AppError>
    where
        D: Clone,
        P: FnOnce(D) -> PFut,
        PFut: Future<Output = Result<Persisted, AppError>>,
        R: FnOnce(D, Vec<FieldError>) -> RFut,
        RFut: Future<Output = Result<Response, AppError>>,
    {
        let draft = match submission {
            Submission::Valid(draft) => draft,
            Submission::Invalid { draft, errors } => {
                debug!(
                    stage = "catalog",
                    entity = self.entity,
                    action = self.action,
                    fields = ?errors.iter().map(|err| err.field).collect::<Vec<_>>(),
                    "form rejected"
                );
                self.record("invalid");
                return reject(draft, errors).await;
            }
        };

        match persist(draft.clone()).await {
            Ok(Persisted::Saved { location }) => {
                info!(
                    stage = "catalog",
                    entity = self.entity,
                    action = self.action,
                    %location,
                    "form persisted"
                );
                self.record("saved");
                Ok(redirect_found(&location))
            }
            Ok(Persisted::Refused(error)) => {
                warn!(
                    stage = "catalog",
                    entity = self.entity,
                    action = self.action,
                    field = error.field,
                    "store refused form values"
                );
                self.record("refused");
                reject(draft, vec![error]).await
            }
            Err(err) => {
                self.record("error");
                Err(err)
            }
        }
    }

    fn record(self, result: &'static str) {
        counter!(
            "catalog_form_submissions_total",
            "entity" => self.entity,
            "action" => self.action,
            "result" => result
        )
        .increment(1);
    }
}

/// `302 Found` to `location`.
pub fn redirect_found(location: &str) -> Response {
    let mut response = Redirect::to(location).into_response();
    *response.status_mut() = StatusCode::FOUND;
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header;
    use std::cell::Cell;

    const PIPELINE: FormPipeline = FormPipeline::new("widget", "create");

    fn invalid() -> Submission<String> {
        Submission::Invalid {
            draft: "draft".to_string(),
            errors: vec![
                FieldError::new("name", "Name must not be empty."),
                FieldError::new("stock", "Stock must not be empty."),
            ],
        }
    }

    fn location(response: &Response) -> &str {
        response
            .headers()
            .get(header::LOCATION)
            .expect("location header")
            .to_str()
            .expect("ascii location")
    }

    #[tokio::test]
    async fn invalid_submission_skips_persist() {
        let writes = Cell::new(0);
        let rejected = Cell::new(0);
        let (writes_seen, rejected_seen) = (&writes, &rejected);
        let response = PIPELINE
            .run(
                invalid(),
                move |_| async move {
                    writes_seen.set(writes_seen.get() + 1);
                    Ok(Persisted::Saved {
                        location: "/widgets/1".to_string(),
                    })
                },
                move |draft, errors| async move {
                    assert_eq!(draft, "draft");
                    rejected_seen.set(errors.len());
                    Ok(StatusCode::OK.into_response())
                },
            )
            .await
            .expect("pipeline");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(writes.get(), 0);
        assert_eq!(rejected.get(), 2);
    }

    #[tokio::test]
    async fn saved_submission_redirects_to_location() {
        let response = PIPELINE
            .run(
                Submission::Valid("draft".to_string()),
                |_| async {
                    Ok(Persisted::Saved {
                        location: "/widgets/1".to_string(),
                    })
                },
                |_, _| async { Err(AppError::NotFound("re-render")) },
            )
            .await
            .expect("pipeline");

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(location(&response), "/widgets/1");
    }

    #[tokio::test]
    async fn refused_values_are_re_rendered_with_the_field() {
        let response = PIPELINE
            .run(
                Submission::Valid("draft".to_string()),
                |_| async {
                    Ok(Persisted::Refused(FieldError::new(
                        "category",
                        "Category must exist.",
                    )))
                },
                |draft, errors| async move {
                    assert_eq!(draft, "draft");
                    assert_eq!(errors, vec![FieldError::new("category", "Category must exist.")]);
                    Ok(StatusCode::OK.into_response())
                },
            )
            .await
            .expect("pipeline");

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn store_failures_propagate() {
        let outcome = PIPELINE
            .run(
                Submission::Valid("draft".to_string()),
                |_| async { Err(AppError::NotFound("Widget")) },
                |_, _| async { Err(AppError::NotFound("re-render")) },
            )
            .await;

        assert!(matches!(outcome, Err(AppError::NotFound("Widget"))));
    }
}
