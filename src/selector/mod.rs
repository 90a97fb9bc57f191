//! Selector model
//!
//! A raw selector rule such as `".content a[href], .footer a[href]"` is split
//! into ordered clauses, each a CSS query plus an optional attribute name.
//! A clause without an attribute yields the matched element's text.

use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

/// One CSS query plus an optional attribute to read from each match
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SelectorClause {
    /// The CSS selector expression
    pub query: String,

    /// Attribute to read; `None` means the element text
    pub attribute: Option<String>,
}

impl SelectorClause {
    /// Parses a single clause, stripping a trailing `[identifier]`
    ///
    /// Only the last bracket group is considered, and only when it holds a
    /// bare identifier; `a[href=^x]` stays a pure query. A clause that is
    /// nothing but the attribute, such as `[href]`, queries every element.
    pub fn parse(raw: &str) -> Self {
        static ATTR: OnceLock<Regex> = OnceLock::new();
        let attr = ATTR.get_or_init(|| {
            Regex::new(r"\[([A-Za-z_][A-Za-z0-9_:.\-]*)\]$").expect("valid attribute regex")
        });

        match attr.captures(raw) {
            Some(caps) => {
                let whole = caps.get(0).map_or(0, |m| m.len());
                let query = raw[..raw.len() - whole].trim_end();
                Self {
                    query: if query.is_empty() { "*" } else { query }.to_string(),
                    attribute: caps.get(1).map(|m| m.as_str().to_string()),
                }
            }
            None => Self {
                query: raw.to_string(),
                attribute: None,
            },
        }
    }
}

impl fmt::Display for SelectorClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.attribute {
            Some(attr) => write!(f, "{}[{}]", self.query, attr),
            None => write!(f, "{}", self.query),
        }
    }
}

/// The four named selector groups a crawl is driven by
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selectors {
    /// Links to recurse into as pages
    pub links: Vec<SelectorClause>,

    /// Resources to fetch and hand to the download sink
    pub downloads: Vec<SelectorClause>,

    /// Clauses whose first non-empty match names the page
    pub titles: Vec<SelectorClause>,

    /// Columns of the per-page print table
    pub prints: Vec<SelectorClause>,
}

impl Selectors {
    /// Builds all groups from raw, possibly repeated, rule strings
    pub fn from_raw(
        links: &[String],
        downloads: &[String],
        titles: &[String],
        prints: &[String],
    ) -> Self {
        Self {
            links: parse_clause_list(links),
            downloads: parse_clause_list(downloads),
            titles: parse_clause_list(titles),
            prints: parse_clause_list(prints),
        }
    }
}

/// Parses a compound selector string into its clauses
///
/// The string is split on commas that are not nested inside brackets,
/// parentheses or quotes. Each piece is trimmed and empty pieces are dropped.
///
/// # Examples
///
/// ```
/// use webdl::selector::parse_group;
///
/// let clauses = parse_group("div>a[href]");
/// assert_eq!(clauses[0].query, "div>a");
/// assert_eq!(clauses[0].attribute.as_deref(), Some("href"));
///
/// assert_eq!(parse_group("a, , b").len(), 2);
/// ```
pub fn parse_group(raw: &str) -> Vec<SelectorClause> {
    split_top_level(raw)
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(SelectorClause::parse)
        .collect()
}

/// Concatenates the clauses of several raw strings, preserving order
pub fn parse_clause_list<S: AsRef<str>>(raw: &[S]) -> Vec<SelectorClause> {
    raw.iter()
        .flat_map(|s| parse_group(s.as_ref()))
        .collect()
}

fn split_top_level(raw: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, c) in raw.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '"' | '\'' => quote = Some(c),
                '[' | '(' => depth += 1,
                ']' | ')' => depth = depth.saturating_sub(1),
                ',' if depth == 0 => {
                    pieces.push(&raw[start..i]);
                    start = i + 1;
                }
                _ => {}
            },
        }
    }
    pieces.push(&raw[start..]);
    pieces
}
