use axum::response::Html;
use minijinja::{AutoEscape, Environment, Value};
use serde::Serialize;

use catalog_core::{Category, Item};

/// Templates compiled into the binary, keyed by the name handlers render.
const TEMPLATES: &[(&str, &str)] = &[
    ("layout.html", include_str!("../templates/layout.html")),
    ("form_errors.html", include_str!("../templates/form_errors.html")),
    ("index.html", include_str!("../templates/index.html")),
    ("category_list.html", include_str!("../templates/category_list.html")),
    ("category_detail.html", include_str!("../templates/category_detail.html")),
    ("category_form.html", include_str!("../templates/category_form.html")),
    ("category_delete.html", include_str!("../templates/category_delete.html")),
    ("item_list.html", include_str!("../templates/item_list.html")),
    ("item_detail.html", include_str!("../templates/item_detail.html")),
    ("item_form.html", include_str!("../templates/item_form.html")),
    ("item_delete.html", include_str!("../templates/item_delete.html")),
];

/// HTML view renderer.
pub struct Templates {
    env: Environment<'static>,
}

impl Templates {
    pub fn new() -> Result<Self, minijinja::Error> {
        let mut env = Environment::new();
        // Entity text is stored already escaped by the form cleaner; escaping
        // it again here would double-encode entities.
        env.set_auto_escape_callback(|_| AutoEscape::None);
        for &(name, source) in TEMPLATES {
            env.add_template(name, source)?;
        }
        Ok(Self { env })
    }

    pub fn render(&self, name: &str, context: Value) -> Result<Html<String>, minijinja::Error> {
        let template = self.env.get_template(name)?;
        template.render(context).map(Html)
    }
}

/// A record paired with its canonical location, the shape views link with.
#[derive(Debug, Serialize)]
pub struct Linked<T> {
    pub url: String,
    #[serde(flatten)]
    pub record: T,
}

impl Linked<Category> {
    pub fn category(record: Category) -> Self {
        Self {
            url: record.url(),
            record,
        }
    }
}

impl Linked<Item> {
    pub fn item(record: Item) -> Self {
        Self {
            url: record.url(),
            record,
        }
    }
}

pub fn linked_categories(records: Vec<Category>) -> Vec<Linked<Category>> {
    records.into_iter().map(Linked::category).collect()
}

pub fn linked_items(records: Vec<Item>) -> Vec<Linked<Item>> {
    records.into_iter().map(Linked::item).collect()
}
