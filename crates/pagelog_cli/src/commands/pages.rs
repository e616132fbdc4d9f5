//! Pages command implementation.

use pagelog_core::{ObjectId, Page, StoreConfig, Stores};
use serde::Serialize;
use std::path::Path;

/// One listed page.
#[derive(Debug, Serialize)]
pub struct PageRow {
    /// Page id as hex.
    pub id: String,
    /// Page title.
    pub title: String,
    /// Creation time in milliseconds since the Unix epoch.
    pub created_at: u64,
}

impl From<Page> for PageRow {
    fn from(page: Page) -> Self {
        Self {
            id: page.id.to_hex(),
            title: page.title,
            created_at: page.created_at.as_millis(),
        }
    }
}

/// Page listing result.
#[derive(Debug, Serialize)]
pub struct PagesResult {
    /// Total pages stored.
    pub count: u64,
    /// Pages shown.
    pub pages: Vec<PageRow>,
}

/// Narrows the listing to a single page.
#[derive(Debug, Clone, Copy)]
pub enum Selector<'a> {
    /// Every page in the window.
    All,
    /// The first page with this exact title.
    Title(&'a str),
    /// The page with this id.
    Id(ObjectId),
}

/// Runs the pages command.
///
/// The journals are opened read-only, so this is safe while a server is
/// writing to the same directory.
pub fn run(
    data_dir: &Path,
    offset: u64,
    limit: u64,
    selector: Selector<'_>,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let result = load(data_dir, offset, limit, selector)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => print_text_output(&result),
    }

    Ok(())
}

fn load(
    data_dir: &Path,
    offset: u64,
    limit: u64,
    selector: Selector<'_>,
) -> Result<PagesResult, Box<dyn std::error::Error>> {
    if !data_dir.is_dir() {
        return Err(format!("No journal directory at {:?}", data_dir).into());
    }

    let stores = Stores::open(&StoreConfig::new().data_dir(data_dir).read_only(true))?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let listing = stores.pages.get_pages(offset, limit).await?;
        let pages = match selector {
            Selector::All => listing.items,
            Selector::Title(title) => stores
                .pages
                .find_page_by_title(title)
                .await?
                .into_iter()
                .collect(),
            Selector::Id(id) => stores.pages.get_page(id).await?.into_iter().collect(),
        };
        Ok::<_, Box<dyn std::error::Error>>(PagesResult {
            count: listing.count,
            pages: pages.into_iter().map(PageRow::from).collect(),
        })
    })
}

fn print_text_output(result: &PagesResult) {
    println!("{} page(s) stored", result.count);
    for page in &result.pages {
        println!("  {}  {:>13}  {}", page.id, page.created_at, page.title);
    }
}
