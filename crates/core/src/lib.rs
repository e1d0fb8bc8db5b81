//! Domain types and form handling for the inventory catalog.
//!
//! The crate is free of I/O: storage and HTTP concerns live in the
//! `catalog-storage` and `catalog-app` crates.

pub mod form;
pub mod types;

pub use form::{clean, CategoryDraft, CategoryForm, FieldError, ItemDraft, ItemForm, Submission};
pub use types::{Category, CategoryRef, Item, ResolvedItem};
