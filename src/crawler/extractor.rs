//! Document extractor
//!
//! Applies the compiled selector groups to one fetched HTML document and
//! produces a [`Page`]:
//! - link and download targets, resolved against the page URL
//! - the page title (first non-empty title match)
//! - the print table, zipped by match ordinal per clause

use crate::selector::{SelectorClause, Selectors};
use crate::state::{Page, PageInfo};
use crate::url::resolve;
use crate::WebdlError;
use scraper::{ElementRef, Html, Selector};
use std::sync::Arc;
use url::Url;

/// A selector clause with its CSS query compiled
#[derive(Debug, Clone)]
struct CompiledClause {
    selector: Selector,
    attribute: Option<String>,
}

impl CompiledClause {
    fn compile(clause: &SelectorClause) -> Result<Self, WebdlError> {
        let selector =
            Selector::parse(&clause.query).map_err(|e| WebdlError::InvalidSelector {
                query: clause.to_string(),
                message: format!("{:?}", e),
            })?;

        Ok(Self {
            selector,
            attribute: clause.attribute.clone(),
        })
    }

    /// Values of every match in document order
    ///
    /// Elements lacking the requested attribute yield nothing and do not
    /// consume an ordinal.
    fn values<'a>(&'a self, document: &'a Html) -> impl Iterator<Item = String> + 'a {
        document
            .select(&self.selector)
            .filter_map(move |element| self.value_of(element))
    }

    fn value_of(&self, element: ElementRef<'_>) -> Option<String> {
        match &self.attribute {
            Some(attr) => element.value().attr(attr).map(str::to_string),
            None => Some(element.text().collect()),
        }
    }
}

/// All four selector groups, compiled once per crawl
#[derive(Debug, Clone)]
pub struct CompiledSelectors {
    links: Vec<CompiledClause>,
    downloads: Vec<CompiledClause>,
    titles: Vec<CompiledClause>,
    prints: Vec<CompiledClause>,
}

impl CompiledSelectors {
    /// Compiles every clause, failing on the first invalid CSS query
    pub fn compile(selectors: &Selectors) -> Result<Self, WebdlError> {
        let compile_group = |group: &[SelectorClause]| {
            group
                .iter()
                .map(CompiledClause::compile)
                .collect::<Result<Vec<_>, _>>()
        };

        Ok(Self {
            links: compile_group(&selectors.links)?,
            downloads: compile_group(&selectors.downloads)?,
            titles: compile_group(&selectors.titles)?,
            prints: compile_group(&selectors.prints)?,
        })
    }
}

/// Extracts links, downloads, title and print rows from an HTML document
///
/// # Arguments
///
/// * `html` - The page body
/// * `info` - The page that was fetched; its title is replaced by the
///   extracted one when a title selector matches
/// * `selectors` - The compiled selector groups
///
/// # Example
///
/// ```
/// use url::Url;
/// use webdl::crawler::{extract, CompiledSelectors};
/// use webdl::selector::Selectors;
/// use webdl::state::PageInfo;
///
/// let selectors = Selectors::from_raw(&["a[href]".to_string()], &[], &[], &[]);
/// let compiled = CompiledSelectors::compile(&selectors).unwrap();
/// let info = PageInfo::seed(Url::parse("https://example.com/").unwrap());
/// let page = extract(r#"<a href="/next">next</a>"#, info, &compiled);
/// assert_eq!(page.links[0].as_str(), "https://example.com/next");
/// ```
pub fn extract(html: &str, mut info: PageInfo, selectors: &CompiledSelectors) -> Page {
    let document = Html::parse_document(html);

    let links = resolve_all(&document, &info.url, &selectors.links);
    let downloads = resolve_all(&document, &info.url, &selectors.downloads);

    if let Some(title) = extract_title(&document, &selectors.titles) {
        info.title = title;
    }

    let print_rows = extract_print_rows(&document, &selectors.prints);

    Page {
        info: Arc::new(info),
        links,
        downloads,
        print_rows,
    }
}

/// Resolves every match of every clause against the page URL
///
/// A match that does not resolve to a valid URL is dropped on its own.
fn resolve_all(document: &Html, base: &Url, clauses: &[CompiledClause]) -> Vec<Url> {
    let mut urls = Vec::new();
    for clause in clauses {
        for href in clause.values(document) {
            match resolve(base, href.trim()) {
                Ok(url) => urls.push(url),
                Err(e) => tracing::debug!("Dropping reference on {}: {}", base, e),
            }
        }
    }
    urls
}

/// First non-empty title match, with whitespace runs collapsed
fn extract_title(document: &Html, clauses: &[CompiledClause]) -> Option<String> {
    clauses
        .iter()
        .flat_map(|clause| clause.values(document))
        .map(|text| collapse_whitespace(&text))
        .find(|text| !text.is_empty())
}

/// Builds the print table
///
/// The k-th match of clause i lands in row k, column i. Clauses are
/// independent streams: rows are created on demand and columns a clause
/// never reaches stay empty.
fn extract_print_rows(document: &Html, clauses: &[CompiledClause]) -> Vec<Vec<String>> {
    let mut rows: Vec<Vec<String>> = Vec::new();
    for (column, clause) in clauses.iter().enumerate() {
        for (row, value) in clause.values(document).enumerate() {
            if rows.len() <= row {
                rows.push(vec![String::new(); clauses.len()]);
            }
            rows[row][column] = value;
        }
    }
    rows
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
