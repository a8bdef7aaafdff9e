//! Filter area shown above a grid.

use std::fmt;
use std::sync::Arc;

use crate::options::{self, OptionTree, OptionValue};

/// Renders the filter area from the form settings.
pub type FilterBlock = Arc<dyn Fn(&FilterForm) -> String + Send + Sync>;

/// Where the filter form submits, and its form attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterForm {
    /// Target of the form; an empty tree means the current page.
    pub url: OptionValue,
    /// Form attributes, `method` defaults to `get`.
    pub options: OptionTree,
}

impl FilterForm {
    #[must_use]
    pub fn new(url: impl Into<OptionValue>, form_options: &OptionTree) -> Self {
        let defaults = OptionTree::new().with("method", "get");
        Self {
            url: url.into(),
            options: options::merge(&defaults, form_options),
        }
    }
}

impl Default for FilterForm {
    fn default() -> Self {
        Self::new(OptionTree::new(), &OptionTree::new())
    }
}

/// A filter block paired with its form settings.
#[derive(Clone)]
pub struct Filter {
    form: FilterForm,
    block: FilterBlock,
}

impl Filter {
    #[must_use]
    pub fn new(form: FilterForm, block: FilterBlock) -> Self {
        Self { form, block }
    }

    #[must_use]
    pub fn form(&self) -> &FilterForm {
        &self.form
    }

    #[must_use]
    pub fn render(&self) -> String {
        (*self.block)(&self.form)
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filter")
            .field("form", &self.form)
            .finish_non_exhaustive()
    }
}
