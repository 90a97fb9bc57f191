use std::sync::Arc;
use url::Url;

/// Identity of a page or resource within one crawl
///
/// The `parent` link points back at the page this one was discovered on.
/// It is shared, immutable and only ever followed towards the seed, so the
/// ancestry forms a finite chain ending at a seed page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageInfo {
    /// Absolute URL of this page or resource
    pub url: Url,

    /// The page this one was discovered on (`None` for seeds)
    pub parent: Option<Arc<PageInfo>>,

    /// Page title; for downloads, the title of the page they were found on
    pub title: String,

    /// Ordinal of this entry among its siblings of the same kind
    pub index: usize,
}

impl PageInfo {
    /// Creates the info for a seed URL
    pub fn seed(url: Url) -> Self {
        Self {
            url,
            parent: None,
            title: String::new(),
            index: 0,
        }
    }

    /// Creates the info for an entry discovered on `parent`
    pub fn child(url: Url, parent: &Arc<PageInfo>, title: String, index: usize) -> Self {
        Self {
            url,
            parent: Some(Arc::clone(parent)),
            title,
            index,
        }
    }

    /// URL of the page this one was found on, sent as the referer
    pub fn referer(&self) -> Option<&Url> {
        self.parent.as_deref().map(|p| &p.url)
    }

    /// Number of ancestors between this entry and its seed
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut current = self.parent.as_deref();
        while let Some(parent) = current {
            depth += 1;
            current = parent.parent.as_deref();
        }
        depth
    }
}

/// Whether a task fetches a page to extract from, or a resource to persist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    Page,
    Download,
}

/// One unit of work in the crawl frontier
#[derive(Debug, Clone)]
pub struct Task {
    pub info: PageInfo,
    pub kind: TaskKind,
}

impl Task {
    pub fn page(info: PageInfo) -> Self {
        Self {
            info,
            kind: TaskKind::Page,
        }
    }

    pub fn download(info: PageInfo) -> Self {
        Self {
            info,
            kind: TaskKind::Download,
        }
    }

    pub fn is_download(&self) -> bool {
        self.kind == TaskKind::Download
    }
}

/// Everything extracted from one fetched page
#[derive(Debug, Clone)]
pub struct Page {
    /// The fetched page, with its extracted title filled in
    pub info: Arc<PageInfo>,

    /// Resolved link targets, in document order per clause
    pub links: Vec<Url>,

    /// Resolved download targets, in document order per clause
    pub downloads: Vec<Url>,

    /// Print table: one row per match ordinal, one column per print clause
    pub print_rows: Vec<Vec<String>>,
}

impl Page {
    /// Builds child tasks: downloads first, then links
    ///
    /// Indices ascend in discovery order unless the matching reverse flag is
    /// set, in which case entry `i` of `n` gets index `n - 1 - i`. Downloads
    /// carry the page title; linked pages get their own title once fetched.
    pub fn child_tasks(&self, reverse_links: bool, reverse_downloads: bool) -> Vec<Task> {
        let ordinal = |i: usize, n: usize, reverse: bool| if reverse { n - 1 - i } else { i };

        let downloads = self.downloads.iter().enumerate().map(|(i, url)| {
            Task::download(PageInfo::child(
                url.clone(),
                &self.info,
                self.info.title.clone(),
                ordinal(i, self.downloads.len(), reverse_downloads),
            ))
        });

        let links = self.links.iter().enumerate().map(|(i, url)| {
            Task::page(PageInfo::child(
                url.clone(),
                &self.info,
                String::new(),
                ordinal(i, self.links.len(), reverse_links),
            ))
        });

        downloads.chain(links).collect()
    }
}
