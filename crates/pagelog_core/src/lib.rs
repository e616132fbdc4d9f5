//! # pagelog Core
//!
//! The value model and the page/value stores.
//!
//! A page line is an ordered list of [`Value`]s. Values may contain
//! [`Value::Reference`]s to records saved earlier through
//! [`ValueStore::save_value`]; [`PageStore::add_page_line`] refuses a line
//! whose page or references do not exist.
//!
//! ## Example
//!
//! ```rust,ignore
//! let stores = Stores::open(&StoreConfig::new())?;
//! let page = stores.pages.create_page("boot").await?;
//! let blob = stores.values.save_value(Value::from("config dump")).await?;
//! stores
//!     .pages
//!     .add_page_line(page, LineType::Log, vec![Value::from("loaded"), Value::Reference(blob)])
//!     .await?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
mod error;
mod model;
mod store;
mod value;

pub use config::StoreConfig;
pub use error::{CoreError, CoreResult};
pub use model::{LineType, Page, PageLine, ValueRecord};
pub use pagelog_storage::{ObjectId, Timestamp};
pub use store::{Listing, PageStore, Stores, ValueStore, PAGES, PAGE_LINES, VALUES};
pub use value::{collect_reference_ids, Value};
