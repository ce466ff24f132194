//! Traits and types for document rendering

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::RenderError;
use crate::types::ExportFormat;

/// One page, ready for rendering
///
/// `html` has already had its wiki links rewritten and its line breaks
/// normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage {
    /// Page title
    pub title: String,
    /// Anchor id of the page's section; links in other pages point here
    pub anchor: String,
    /// Normalized HTML content
    pub html: String,
}

/// Document-level information shown on the title page and in metadata
#[derive(Debug, Clone)]
pub struct RenderMetadata {
    /// Wiki display name, used as the document title
    pub title: String,
    /// Owning course
    pub course_id: i64,
    /// Name of the requesting user
    pub author: String,
    /// Generation time
    pub generated_at: DateTime<Utc>,
}

/// Trait for the external document renderer
///
/// Implementations receive pages in export order and return the finished
/// document. A renderer must fail rather than drop a page it cannot process.
///
/// # Examples
///
/// ```no_run
/// use wiki_export::export::{DocumentRenderer, EpubRenderer, RenderMetadata, RenderedPage};
/// use wiki_export::types::ExportFormat;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let renderer = EpubRenderer::new();
/// let pages = vec![RenderedPage {
///     title: "Home".into(),
///     anchor: "page-home".into(),
///     html: "<p>Welcome</p>".into(),
/// }];
/// let meta = RenderMetadata {
///     title: "Example wiki".into(),
///     course_id: 2,
///     author: "Admin".into(),
///     generated_at: chrono::Utc::now(),
/// };
/// let bytes = renderer.render(&pages, ExportFormat::Epub, &meta).await?;
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait DocumentRenderer: Send + Sync {
    /// Render `pages` into a single document of the given format
    ///
    /// # Errors
    ///
    /// Returns `RenderError::Unsupported` if this renderer cannot produce
    /// `format`, and `Rejected`/`Tool` when rendering fails.
    async fn render(
        &self,
        pages: &[RenderedPage],
        format: ExportFormat,
        meta: &RenderMetadata,
    ) -> Result<Vec<u8>, RenderError>;

    /// Whether this renderer can produce `format`
    fn supports(&self, format: ExportFormat) -> bool;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// Escape text for inclusion in HTML element content or attribute values
pub(crate) fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Assemble all pages into one standalone HTML document
///
/// The document starts with a title page and a table of contents, followed
/// by one `<section>` per page whose `id` is the page anchor.
pub fn assemble_html(pages: &[RenderedPage], meta: &RenderMetadata) -> String {
    let title = escape_html(&meta.title);
    let mut html = String::new();

    html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\"/>\n");
    html.push_str(&format!("<title>{}</title>\n", title));
    html.push_str("<style>section.page { page-break-before: always; }</style>\n");
    html.push_str("</head>\n<body>\n");

    html.push_str("<div class=\"title-page\">\n");
    html.push_str(&format!("<h1>{}</h1>\n", title));
    html.push_str(&format!(
        "<p class=\"author\">{}</p>\n<p class=\"date\">{}</p>\n",
        escape_html(&meta.author),
        meta.generated_at.format("%Y-%m-%d")
    ));
    html.push_str("</div>\n");

    html.push_str("<nav class=\"toc\">\n<ol>\n");
    for page in pages {
        html.push_str(&format!(
            "<li><a href=\"#{}\">{}</a></li>\n",
            page.anchor,
            escape_html(&page.title)
        ));
    }
    html.push_str("</ol>\n</nav>\n");

    for page in pages {
        html.push_str(&format!(
            "<section class=\"page\" id=\"{}\">\n<h1>{}</h1>\n",
            page.anchor,
            escape_html(&page.title)
        ));
        html.push_str(&page.html);
        html.push_str("\n</section>\n");
    }

    html.push_str("</body>\n</html>\n");
    html
}
