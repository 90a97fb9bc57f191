//! Naming and print templates
//!
//! A template is literal text with `{field}` placeholders. A placeholder may
//! carry a width (`{index:06}` zero-pads, `{index:6}` space-pads) and a
//! filter (`{title|alphanum}`, `{title|path}`, `{0|href}`). `{{` and `}}`
//! are literal braces. The `href` filter resolves a value against `url` the
//! way links are resolved, so printed relative references become absolute;
//! on `row` it applies to each column.
//!
//! | Field        | Value                                                  |
//! |--------------|--------------------------------------------------------|
//! | `url`        | URL of the download (or printed page)                  |
//! | `referer`    | URL of the page it was found on                        |
//! | `index`      | ordinal of the entry on its page                       |
//! | `page_index` | ordinal of the page within its own parent page         |
//! | `title`      | title of the page                                      |
//! | `name`       | last URL path segment without extension                |
//! | `ext`        | extension of the last path segment, without the dot    |
//! | `row`        | print templates only: the row's columns, tab separated |
//! | `0`, `1`, …  | print templates only: one column of the row            |

use crate::state::PageInfo;
use crate::url::resolve;
use crate::ConfigError;
use regex::Regex;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Url,
    Referer,
    Index,
    PageIndex,
    Title,
    Name,
    Ext,
    Row,
    Column(usize),
}

impl Field {
    fn parse(name: &str, allow_row: bool) -> Option<Self> {
        let field = match name {
            "url" => Self::Url,
            "referer" => Self::Referer,
            "index" => Self::Index,
            "page_index" => Self::PageIndex,
            "title" => Self::Title,
            "name" => Self::Name,
            "ext" => Self::Ext,
            "row" => Self::Row,
            other => Self::Column(other.parse().ok()?),
        };

        match field {
            Self::Row | Self::Column(_) if !allow_row => None,
            field => Some(field),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Filter {
    Alphanum,
    Path,
    Href,
}

impl Filter {
    fn apply(&self, value: &str, base: &str) -> String {
        static ALPHANUM: OnceLock<Regex> = OnceLock::new();
        static PATH: OnceLock<Regex> = OnceLock::new();

        let re = match self {
            Self::Href => return absolute(base, value),
            Self::Alphanum => ALPHANUM.get_or_init(|| {
                Regex::new(r"(?i)[^a-z0-9\-_ ]+").expect("valid alphanum regex")
            }),
            Self::Path => PATH.get_or_init(|| {
                Regex::new(r"^\.\.+|\\+|/+|\.\.+$").expect("valid path regex")
            }),
        };
        re.replace_all(value, "-").trim_matches('-').to_string()
    }
}

/// `value` resolved against `base`, or unchanged if either does not parse
fn absolute(base: &str, value: &str) -> String {
    url::Url::parse(base)
        .ok()
        .and_then(|base| resolve(&base, value.trim()).ok())
        .map_or_else(|| value.to_string(), |url| url.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Width {
    width: usize,
    zero: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder {
        field: Field,
        width: Option<Width>,
        filter: Option<Filter>,
    },
}

/// Values a template is rendered against
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateData {
    pub url: String,
    pub referer: String,
    pub index: usize,
    pub page_index: usize,
    pub title: String,
    pub name: String,
    pub ext: String,
    pub row: Vec<String>,
}

impl TemplateData {
    /// Data for a download: page fields come from the page it was found on
    pub fn for_download(info: &PageInfo) -> Self {
        let (name, ext) = split_file_name(&info.url);
        let parent = info.parent.as_deref();
        Self {
            url: info.url.to_string(),
            referer: parent.map(|p| p.url.to_string()).unwrap_or_default(),
            index: info.index,
            page_index: parent.map_or(0, |p| p.index),
            title: parent.map_or(info.title.as_str(), |p| p.title.as_str()).trim().to_string(),
            name,
            ext,
            row: Vec::new(),
        }
    }

    /// Data for one print row of a fetched page
    ///
    /// Unlike downloads, `page_index` and `title` describe the printed page
    /// itself rather than the page it was linked from, so a row can name the
    /// page it came from.
    pub fn for_page(info: &PageInfo, row: &[String]) -> Self {
        let (name, ext) = split_file_name(&info.url);
        Self {
            url: info.url.to_string(),
            referer: info.referer().map(|u| u.to_string()).unwrap_or_default(),
            index: info.index,
            page_index: info.index,
            title: info.title.trim().to_string(),
            name,
            ext,
            row: row.to_vec(),
        }
    }
}

fn split_file_name(url: &url::Url) -> (String, String) {
    let file = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or("")
        .trim();

    match file.rsplit_once('.') {
        Some((name, ext)) if !name.is_empty() => (name.to_string(), ext.to_string()),
        _ => (file.to_string(), String::new()),
    }
}

/// A parsed template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    /// Parses a destination-path template (no row fields)
    pub fn parse_path(source: &str) -> Result<Self, ConfigError> {
        Self::parse(source, false)
    }

    /// Parses a print template (row and column fields allowed)
    pub fn parse_print(source: &str) -> Result<Self, ConfigError> {
        Self::parse(source, true)
    }

    fn parse(source: &str, allow_row: bool) -> Result<Self, ConfigError> {
        let invalid = |msg: String| ConfigError::InvalidTemplate(format!("{}: '{}'", msg, source));

        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '}' => return Err(invalid("unmatched '}'".to_string())),
                '{' => {
                    let mut inner = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some(c) => inner.push(c),
                            None => return Err(invalid("unclosed '{'".to_string())),
                        }
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Self::parse_placeholder(&inner, allow_row).map_err(invalid)?);
                }
                c => literal.push(c),
            }
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }
        Ok(Self { segments })
    }

    fn parse_placeholder(inner: &str, allow_row: bool) -> Result<Segment, String> {
        let (inner, filter) = match inner.split_once('|') {
            Some((inner, "alphanum")) => (inner, Some(Filter::Alphanum)),
            Some((inner, "path")) => (inner, Some(Filter::Path)),
            Some((inner, "href")) => (inner, Some(Filter::Href)),
            Some((_, other)) => return Err(format!("unknown filter '{}'", other.trim())),
            None => (inner, None),
        };

        let (name, width) = match inner.split_once(':') {
            Some((name, width)) => {
                let parsed = width
                    .parse::<usize>()
                    .map_err(|_| format!("invalid width '{}'", width))?;
                (
                    name,
                    Some(Width {
                        width: parsed,
                        zero: width.starts_with('0'),
                    }),
                )
            }
            None => (inner, None),
        };

        let name = name.trim();
        let field =
            Field::parse(name, allow_row).ok_or_else(|| format!("unknown field '{}'", name))?;

        Ok(Segment::Placeholder {
            field,
            width,
            filter,
        })
    }

    /// Renders the template
    pub fn render(&self, data: &TemplateData) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder {
                    field,
                    width,
                    filter,
                } => {
                    let value = match (field, filter) {
                        (Field::Row, Some(filter)) => data
                            .row
                            .iter()
                            .map(|column| filter.apply(column, &data.url))
                            .collect::<Vec<_>>()
                            .join("\t"),
                        (field, filter) => {
                            let value = Self::field_value(*field, data);
                            match filter {
                                Some(filter) => filter.apply(&value, &data.url),
                                None => value,
                            }
                        }
                    };
                    match width {
                        Some(Width { width, zero: true }) => {
                            out.push_str(&format!("{:0>width$}", value, width = *width))
                        }
                        Some(Width { width, zero: false }) => {
                            out.push_str(&format!("{:>width$}", value, width = *width))
                        }
                        None => out.push_str(&value),
                    }
                }
            }
        }
        out
    }

    fn field_value(field: Field, data: &TemplateData) -> String {
        match field {
            Field::Url => data.url.clone(),
            Field::Referer => data.referer.clone(),
            Field::Index => data.index.to_string(),
            Field::PageIndex => data.page_index.to_string(),
            Field::Title => data.title.clone(),
            Field::Name => data.name.clone(),
            Field::Ext => data.ext.clone(),
            Field::Row => data.row.join("\t"),
            Field::Column(i) => data.row.get(i).cloned().unwrap_or_default(),
        }
    }
}
