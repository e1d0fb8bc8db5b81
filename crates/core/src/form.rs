//! Validation and sanitization of submitted entity forms.
//!
//! Every field goes through the same stage: surrounding whitespace is
//! trimmed, the trimmed value must contain at least one character, and the
//! markup-significant characters are replaced with HTML entities. All fields
//! of a form are checked; errors are collected rather than returned on the
//! first failure so a re-rendered form can show every problem at once.

use serde::{Deserialize, Serialize};

/// A rejected form field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: &'static str,
}

impl FieldError {
    pub const fn new(field: &'static str, message: &'static str) -> Self {
        Self { field, message }
    }
}

/// Outcome of checking a submitted form.
///
/// Both variants carry the cleaned values; the invalid one also carries the
/// complete list of field errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission<D> {
    Valid(D),
    Invalid { draft: D, errors: Vec<FieldError> },
}

impl<D> Submission<D> {
    fn from_parts(draft: D, errors: Vec<FieldError>) -> Self {
        if errors.is_empty() {
            Self::Valid(draft)
        } else {
            Self::Invalid { draft, errors }
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }

    pub fn draft(&self) -> &D {
        match self {
            Self::Valid(draft) | Self::Invalid { draft, .. } => draft,
        }
    }
}

/// Trims `raw` and escapes characters that are significant in HTML.
pub fn clean(raw: &str) -> String {
    let trimmed = raw.trim();
    let mut escaped = String::with_capacity(trimmed.len());
    for ch in trimmed.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            '/' => escaped.push_str("&#x2F;"),
            '\\' => escaped.push_str("&#x5C;"),
            '`' => escaped.push_str("&#96;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Accumulates field errors across one form.
#[derive(Debug, Default)]
struct FormCheck {
    errors: Vec<FieldError>,
}

impl FormCheck {
    /// Cleans a field that must not be empty once trimmed.
    fn required(&mut self, field: &'static str, raw: &str, message: &'static str) -> String {
        if raw.trim().chars().count() < 1 {
            self.errors.push(FieldError::new(field, message));
        }
        clean(raw)
    }

    fn finish<D>(self, draft: D) -> Submission<D> {
        Submission::from_parts(draft, self.errors)
    }
}

/// Raw category form body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Cleaned category values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CategoryDraft {
    pub name: String,
    pub description: String,
}

impl CategoryForm {
    pub fn check(&self) -> Submission<CategoryDraft> {
        let mut check = FormCheck::default();
        let draft = CategoryDraft {
            name: check.required("name", &self.name, "Name must not be empty."),
            description: check.required(
                "description",
                &self.description,
                "Description must not be empty.",
            ),
        };
        check.finish(draft)
    }
}

/// Raw item form body. `category` holds the referenced category id.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub stock: String,
}

/// Cleaned item values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ItemDraft {
    pub name: String,
    pub category: String,
    pub description: String,
    pub stock: String,
}

impl ItemForm {
    pub fn check(&self) -> Submission<ItemDraft> {
        let mut check = FormCheck::default();
        let draft = ItemDraft {
            name: check.required("name", &self.name, "Name must not be empty."),
            category: check.required("category", &self.category, "Category must not be empty."),
            description: check.required(
                "description",
                &self.description,
                "Description must not be empty.",
            ),
            stock: check.required("stock", &self.stock, "Stock must not be empty."),
        };
        check.finish(draft)
    }
}
