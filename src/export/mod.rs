//! Wiki export
//!
//! [`ExportBuilder`] turns all pages of a wiki into one document:
//!
//! 1. Load the pages and order them breadth-first from the entry page,
//!    following `[[wiki links]]` in order of discovery
//! 2. Rewrite wiki links into in-document anchors and normalize line breaks
//! 3. Hand the pages to a [`DocumentRenderer`], bounded by the render timeout
//!
//! Renderers:
//! - [`EpubRenderer`] packages EPUB 3 in-process
//! - [`CommandRenderer`] pipes HTML through an external PDF converter
//! - [`DefaultRenderer`] dispatches on the requested format
//!
//! Rendered artifacts can be cached on disk with [`ArtifactCache`].

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;

use crate::config::ExportConfig;
use crate::error::RenderError;
use crate::links::{anchor_for, discover_links, rewrite_links};
use crate::normalize::normalize_line_breaks;
use crate::store::WikiStore;
use crate::types::{ExportArtifact, ExportFormat, UserRef, WikiInstance, WikiPage};
use crate::{Error, Result};

mod cache;
mod command;
mod epub;
mod renderer;

pub use cache::ArtifactCache;
pub use command::{CommandRenderer, DEFAULT_PDF_COMMAND};
pub use epub::EpubRenderer;
pub use renderer::{DocumentRenderer, RenderMetadata, RenderedPage, assemble_html};

/// Characters replaced by `_` in export filenames
const UNSAFE_FILENAME_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Filename of an export: `Export_<name>_<YYYY-MM-DD>.<ext>`
///
/// Whitespace and characters unsafe in filenames are replaced by underscores.
///
/// ```
/// use chrono::NaiveDate;
/// use wiki_export::export::export_filename;
/// use wiki_export::types::ExportFormat;
///
/// let date = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
/// assert_eq!(
///     export_filename("Example wiki", date, ExportFormat::Pdf),
///     "Export_Example_wiki_2026-10-18.pdf"
/// );
/// ```
pub fn export_filename(name: &str, date: NaiveDate, format: ExportFormat) -> String {
    let mut safe: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_whitespace() || c.is_control() || UNSAFE_FILENAME_CHARS.contains(&c) {
                '_'
            } else {
                c
            }
        })
        .collect();
    if safe.is_empty() {
        safe.push_str("wiki");
    }
    format!(
        "Export_{}_{}.{}",
        safe,
        date.format("%Y-%m-%d"),
        format.extension()
    )
}

/// Order the pages of a wiki for export
///
/// Starts at the page titled `entry_title` and walks links breadth-first,
/// visiting each page once; links to pages that do not exist are ignored.
///
/// With a non-empty `selection`, only selected pages are kept: reachable ones
/// in traversal order, then unreachable ones in selection order. Without one,
/// `include_orphans` appends unreachable pages sorted by title.
///
/// # Errors
///
/// `Error::NotFound` when no page has the entry title.
pub fn order_pages<'a>(
    pages: &'a [WikiPage],
    entry_title: &str,
    selection: Option<&[String]>,
    include_orphans: bool,
) -> Result<Vec<&'a WikiPage>> {
    let by_title: HashMap<&str, &WikiPage> =
        pages.iter().map(|p| (p.title.as_str(), p)).collect();

    let entry = by_title
        .get(entry_title)
        .copied()
        .ok_or_else(|| Error::NotFound(format!("entry page '{}'", entry_title)))?;

    let mut visited: HashSet<&str> = HashSet::from([entry.title.as_str()]);
    let mut queue = VecDeque::from([entry]);
    let mut ordered = Vec::with_capacity(pages.len());

    while let Some(page) = queue.pop_front() {
        ordered.push(page);
        for link in discover_links(&page.content) {
            if let Some(&target) = by_title.get(link.as_str())
                && visited.insert(target.title.as_str())
            {
                queue.push_back(target);
            }
        }
    }

    match selection.filter(|s| !s.is_empty()) {
        Some(selection) => {
            let mut wanted: Vec<&WikiPage> = Vec::with_capacity(selection.len());
            for title in selection {
                match by_title.get(title.trim()) {
                    Some(&page) => {
                        if !wanted.iter().any(|p| p.id == page.id) {
                            wanted.push(page);
                        }
                    }
                    None => {
                        tracing::warn!(title = %title, "Selected page does not exist, ignoring")
                    }
                }
            }

            let mut result: Vec<&WikiPage> = ordered
                .into_iter()
                .filter(|p| wanted.iter().any(|w| w.id == p.id))
                .collect();
            for page in wanted {
                if !result.iter().any(|p| p.id == page.id) {
                    result.push(page);
                }
            }
            Ok(result)
        }
        None => {
            if include_orphans {
                let mut orphans: Vec<&WikiPage> = pages
                    .iter()
                    .filter(|p| !visited.contains(p.title.as_str()))
                    .collect();
                orphans.sort_by(|a, b| a.title.cmp(&b.title));
                ordered.extend(orphans);
            }
            Ok(ordered)
        }
    }
}

/// Rewrite links and normalize line breaks for the ordered pages
///
/// Anchors are unique within the document; colliding slugs get a numeric
/// suffix. Links to pages outside the export become plain text.
pub fn prepare_pages(ordered: &[&WikiPage]) -> Vec<RenderedPage> {
    let mut used: HashSet<String> = HashSet::with_capacity(ordered.len());
    let mut anchors: HashMap<&str, String> = HashMap::with_capacity(ordered.len());

    for page in ordered {
        let base = anchor_for(&page.title);
        let mut anchor = base.clone();
        let mut n = 2;
        while !used.insert(anchor.clone()) {
            anchor = format!("{}-{}", base, n);
            n += 1;
        }
        anchors.insert(page.title.as_str(), anchor);
    }

    ordered
        .iter()
        .map(|page| {
            let linked = rewrite_links(&page.content, |title| anchors.get(title).cloned());
            RenderedPage {
                title: page.title.clone(),
                anchor: anchors
                    .get(page.title.as_str())
                    .cloned()
                    .unwrap_or_else(|| anchor_for(&page.title)),
                html: normalize_line_breaks(&linked),
            }
        })
        .collect()
}

/// Builds the export document of one wiki
///
/// # Examples
///
/// ```no_run
/// use wiki_export::db::Database;
/// use wiki_export::export::{DefaultRenderer, ExportBuilder};
/// use wiki_export::store::WikiStore;
/// use wiki_export::types::{UserRef, WikiId};
/// use std::path::Path;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let db = Database::new(Path::new("wiki-export.db")).await?;
/// let wiki = db.wiki(WikiId(1)).await?;
/// let renderer = DefaultRenderer::from_config(&Default::default());
///
/// let artifact = ExportBuilder::new(wiki.cmid, wiki, "epub", UserRef::system(), None)?
///     .build(&db, &renderer)
///     .await?;
/// println!("{} ({} pages)", artifact.filename, artifact.page_count);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ExportBuilder {
    wiki: WikiInstance,
    format: ExportFormat,
    user: UserRef,
    selection: Option<Vec<String>>,
    include_orphans: bool,
    render_timeout: Duration,
    cache: Option<ArtifactCache>,
    generated_at: Option<DateTime<Utc>>,
}

impl ExportBuilder {
    /// Prepare an export of `wiki` in the context `context_id`
    ///
    /// An empty `format` falls back to the user's preferred format, then to
    /// the wiki's default. `pages` optionally restricts the export to the
    /// given titles.
    ///
    /// # Errors
    ///
    /// - `Error::NotFound` if the wiki does not belong to `context_id`
    /// - `Error::UnsupportedFormat` if `format` is not a known format
    pub fn new(
        context_id: i64,
        wiki: WikiInstance,
        format: &str,
        user: UserRef,
        pages: Option<Vec<String>>,
    ) -> Result<Self> {
        if wiki.cmid != context_id {
            return Err(Error::NotFound(format!(
                "wiki {} in context {}",
                wiki.id, context_id
            )));
        }

        let format = if format.trim().is_empty() {
            user.preferred_format.unwrap_or(wiki.default_format)
        } else {
            format.parse()?
        };

        let defaults = ExportConfig::default();
        Ok(Self {
            wiki,
            format,
            user,
            selection: pages,
            include_orphans: defaults.include_orphans,
            render_timeout: defaults.render_timeout,
            cache: None,
            generated_at: None,
        })
    }

    /// Apply orphan handling, render timeout and caching from `config`
    pub fn with_config(mut self, config: &ExportConfig) -> Self {
        self.include_orphans = config.include_orphans;
        self.render_timeout = config.render_timeout;
        self.cache = config.cache_dir.as_ref().map(ArtifactCache::new);
        self
    }

    /// Fix the generation time (defaults to the time `build` is called)
    pub fn generated_at(mut self, at: DateTime<Utc>) -> Self {
        self.generated_at = Some(at);
        self
    }

    /// The resolved export format
    pub fn format(&self) -> ExportFormat {
        self.format
    }

    /// The wiki being exported
    pub fn wiki(&self) -> &WikiInstance {
        &self.wiki
    }

    /// Render the export
    ///
    /// Pages are never skipped: if the renderer rejects one, the whole export
    /// fails.
    ///
    /// # Errors
    ///
    /// - `Error::NotFound` if the wiki has no entry page or none of the
    ///   selected pages exist
    /// - `Error::Render` if the renderer fails or times out
    pub async fn build(
        &self,
        store: &dyn WikiStore,
        renderer: &dyn DocumentRenderer,
    ) -> Result<ExportArtifact> {
        let generated_at = self.generated_at.unwrap_or_else(Utc::now);

        if !renderer.supports(self.format) {
            return Err(RenderError::Unsupported(self.format.to_string()).into());
        }

        let pages = store.pages(self.wiki.id).await?;
        let ordered = order_pages(
            &pages,
            &self.wiki.first_page_title,
            self.selection.as_deref(),
            self.include_orphans,
        )
        .map_err(|_| {
            Error::NotFound(format!(
                "entry page '{}' of wiki {}",
                self.wiki.first_page_title, self.wiki.id
            ))
        })?;

        if ordered.is_empty() {
            return Err(Error::NotFound(format!(
                "none of the selected pages exist in wiki {}",
                self.wiki.id
            )));
        }

        let rendered = prepare_pages(&ordered);
        let meta = RenderMetadata {
            title: self.wiki.name.clone(),
            course_id: self.wiki.course_id,
            author: self.user.display_name.clone(),
            generated_at,
        };

        let cache_key = self
            .cache
            .as_ref()
            .map(|_| ArtifactCache::fingerprint(self.format, &meta, &rendered));

        let cached = match (&self.cache, &cache_key) {
            (Some(cache), Some(key)) => cache.get(key, self.format).await,
            _ => None,
        };

        let bytes = match cached {
            Some(bytes) => {
                tracing::debug!(
                    wiki_id = %self.wiki.id,
                    format = %self.format,
                    "Using cached artifact"
                );
                bytes
            }
            None => {
                let bytes = self.render(renderer, &rendered, &meta).await?;
                if let (Some(cache), Some(key)) = (&self.cache, &cache_key) {
                    cache.put(key, self.format, &bytes).await;
                }
                bytes
            }
        };

        let artifact = ExportArtifact {
            filename: export_filename(&self.wiki.name, generated_at.date_naive(), self.format),
            format: self.format,
            bytes,
            page_count: rendered.len(),
            generated_at,
        };

        tracing::info!(
            wiki_id = %self.wiki.id,
            format = %self.format,
            pages = artifact.page_count,
            size = artifact.bytes.len(),
            filename = %artifact.filename,
            "Export built"
        );

        Ok(artifact)
    }

    async fn render(
        &self,
        renderer: &dyn DocumentRenderer,
        pages: &[RenderedPage],
        meta: &RenderMetadata,
    ) -> Result<Vec<u8>> {
        tracing::debug!(
            wiki_id = %self.wiki.id,
            renderer = renderer.name(),
            pages = pages.len(),
            "Rendering export"
        );

        match tokio::time::timeout(self.render_timeout, renderer.render(pages, self.format, meta))
            .await
        {
            Ok(result) => Ok(result?),
            Err(_) => Err(RenderError::Timeout(self.render_timeout).into()),
        }
    }
}

/// Renderer that dispatches on the requested format
///
/// EPUB is always available; PDF requires an external converter.
#[derive(Debug, Clone, Default)]
pub struct DefaultRenderer {
    epub: EpubRenderer,
    pdf: Option<CommandRenderer>,
}

impl DefaultRenderer {
    /// Create a renderer with an optional PDF converter
    pub fn new(pdf: Option<CommandRenderer>) -> Self {
        Self {
            epub: EpubRenderer::new(),
            pdf,
        }
    }

    /// Build from configuration, locating the PDF converter
    pub fn from_config(config: &ExportConfig) -> Self {
        let pdf = CommandRenderer::from_config(config);
        if pdf.is_none() {
            tracing::warn!(
                command = DEFAULT_PDF_COMMAND,
                "No PDF converter found, PDF exports are unavailable"
            );
        }
        Self::new(pdf)
    }
}

#[async_trait]
impl DocumentRenderer for DefaultRenderer {
    async fn render(
        &self,
        pages: &[RenderedPage],
        format: ExportFormat,
        meta: &RenderMetadata,
    ) -> std::result::Result<Vec<u8>, RenderError> {
        match format {
            ExportFormat::Epub => self.epub.render(pages, format, meta).await,
            ExportFormat::Pdf => match &self.pdf {
                Some(pdf) => pdf.render(pages, format, meta).await,
                None => Err(RenderError::Unsupported(format.to_string())),
            },
        }
    }

    fn supports(&self, format: ExportFormat) -> bool {
        match format {
            ExportFormat::Epub => true,
            ExportFormat::Pdf => self.pdf.is_some(),
        }
    }

    fn name(&self) -> &'static str {
        "default"
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
