use crate::{UrlError, UrlResult};
use regex::Regex;
use std::sync::OnceLock;
use url::{Position, Url};

/// Matches a leading `scheme:` as defined by RFC 3986
fn scheme_prefix() -> &'static Regex {
    static SCHEME: OnceLock<Regex> = OnceLock::new();
    SCHEME.get_or_init(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*:").expect("valid scheme regex"))
}

/// Resolves a hyperlink reference found on `base` into an absolute URL
///
/// # Resolution Rules
///
/// | `href` shape              | Result                                         |
/// |---------------------------|------------------------------------------------|
/// | empty                     | `base` unchanged                               |
/// | `scheme:...`              | parsed on its own                              |
/// | `//host/...`              | parsed on its own, scheme inherited from base  |
/// | `/path`                   | base origin + `href`, base path/query dropped  |
/// | anything else             | relative to base path, base query dropped      |
///
/// # Arguments
///
/// * `base` - The URL of the page the reference was found on
/// * `href` - The raw reference (attribute value or element text)
///
/// # Returns
///
/// * `Ok(Url)` - The absolute URL
/// * `Err(UrlError)` - The resulting URL is malformed
///
/// # Examples
///
/// ```
/// use url::Url;
/// use webdl::url::resolve;
///
/// let base = Url::parse("https://a.com/x/y").unwrap();
/// assert_eq!(resolve(&base, "/z").unwrap().as_str(), "https://a.com/z");
/// assert_eq!(resolve(&base, "z").unwrap().as_str(), "https://a.com/x/z");
/// ```
pub fn resolve(base: &Url, href: &str) -> UrlResult<Url> {
    let parse_err = |source| UrlError::Parse {
        href: href.to_string(),
        source,
    };

    if href.is_empty() {
        return Ok(base.clone());
    }

    if scheme_prefix().is_match(href) {
        return Url::parse(href).map_err(parse_err);
    }

    if href.starts_with("//") {
        return Url::parse(&format!("{}:{}", base.scheme(), href)).map_err(parse_err);
    }

    if href.starts_with('/') {
        let origin = &base[..Position::BeforePath];
        return Url::parse(&format!("{}{}", origin, href)).map_err(parse_err);
    }

    let mut relative_to = base.clone();
    relative_to.set_query(None);
    relative_to.set_fragment(None);
    relative_to.join(href).map_err(parse_err)
}
