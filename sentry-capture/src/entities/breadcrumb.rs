use sentry::protocol::Breadcrumb;

use super::{bag, entries, text};
use crate::datum::Datum;
use crate::error::BuildError;
use crate::level::to_severity;
use crate::normalize::normalize_entries;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BreadcrumbFields {
    pub ty: Option<String>,
    pub level: Option<Datum>,
    pub message: Option<String>,
    pub category: Option<String>,
    pub data: Option<Vec<(Datum, Datum)>>,
}

impl BreadcrumbFields {
    pub fn from_datum(datum: &Datum) -> Result<Self, BuildError> {
        entries(datum, "breadcrumbs")?;

        Ok(BreadcrumbFields {
            ty: text(datum, "type"),
            level: datum.get("level").cloned(),
            message: text(datum, "message"),
            category: text(datum, "category"),
            data: bag(datum, "data")?,
        })
    }

    pub fn build(&self) -> Result<Breadcrumb, BuildError> {
        let mut breadcrumb = Breadcrumb::default();

        if let Some(ty) = &self.ty {
            breadcrumb.ty = ty.clone();
        }
        if let Some(level) = &self.level {
            breadcrumb.level = to_severity(Some(level));
        }
        if let Some(message) = &self.message {
            breadcrumb.message = Some(message.clone());
        }
        if let Some(category) = &self.category {
            breadcrumb.category = Some(category.clone());
        }
        if let Some(data) = &self.data {
            breadcrumb.data = normalize_entries(data).map_err(BuildError::conversion("data"))?;
        }

        Ok(breadcrumb)
    }
}
