//! `autogrid` core: option resolution, column registry, visibility/sort
//! state, and query fragments for sortable, column-configurable data grids.

pub mod column;
pub mod config;
pub mod error;
pub mod filter;
pub mod format;
pub mod fragment;
pub mod inflect;
pub mod options;
pub mod persistence;
pub mod record;
pub mod registry;
pub mod table;
pub mod value;
pub mod visibility;

pub use column::{BoundCell, Column, ColumnContext, ColumnOptions, RenderBlock, SortDirection};
pub use config::{RowLink, TableConfig};
pub use error::{ConfigError, GridError};
pub use filter::{Filter, FilterBlock, FilterForm};
pub use format::{Formatter, FormatterRegistry};
pub use options::{LazyDefault, OptionTree, OptionValue, Overrides, RuleSet};
pub use persistence::{Preference, PreferenceStore};
pub use record::{Field, RecordProvider, RecordType, Row, TypeCatalog};
pub use registry::ColumnRegistry;
pub use table::Table;
pub use value::Value;
pub use visibility::SortState;
