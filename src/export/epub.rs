//! EPUB 3 packager
//!
//! Each page becomes its own XHTML document inside the container; in-document
//! anchors are redirected to the file that holds the target page.

use async_trait::async_trait;
use regex::Regex;
use std::collections::HashSet;
use std::io::{Cursor, Write};
use std::sync::LazyLock;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::renderer::{DocumentRenderer, RenderMetadata, RenderedPage, escape_html};
use crate::error::RenderError;
use crate::types::ExportFormat;

#[allow(clippy::expect_used)]
static ANCHOR_HREF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r##"href="#([^"]+)""##).expect("valid anchor href pattern"));

#[allow(clippy::expect_used)]
static VOID_ELEMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        concat!(
            r"(?i)<(area|base|br|col|embed|hr|img|input|link|meta|source|track|wbr)\b",
            r#"((?:[^>"']|"[^"]*"|'[^']*')*?)\s*/?>"#,
        ),
    )
    .expect("valid void element pattern")
});

#[allow(clippy::expect_used)]
static NAMED_ENTITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&([a-zA-Z][a-zA-Z0-9]*);").expect("valid entity pattern"));

/// HTML named entities common in wiki text, as code points
const HTML_ENTITIES: &[(&str, u32)] = &[
    ("nbsp", 160),
    ("copy", 169),
    ("reg", 174),
    ("deg", 176),
    ("middot", 183),
    ("laquo", 171),
    ("raquo", 187),
    ("times", 215),
    ("ndash", 8211),
    ("mdash", 8212),
    ("lsquo", 8216),
    ("rsquo", 8217),
    ("ldquo", 8220),
    ("rdquo", 8221),
    ("hellip", 8230),
    ("euro", 8364),
    ("trade", 8482),
];

const CONTAINER_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>
"#;

/// Renderer producing EPUB 3 documents
///
/// Page HTML is embedded into XHTML documents after two repairs: void
/// elements such as `<br>` or `<img ...>` are self-closed, and the common
/// HTML named entities (`&nbsp;` and friends) become numeric references.
/// Other malformed markup, like unclosed `<p>` or `<li>` elements or rarer
/// named entities, is passed through as is and may be rejected by strict
/// XML-based readers.
#[derive(Debug, Clone, Default)]
pub struct EpubRenderer;

impl EpubRenderer {
    /// Create a new EPUB renderer
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DocumentRenderer for EpubRenderer {
    async fn render(
        &self,
        pages: &[RenderedPage],
        format: ExportFormat,
        meta: &RenderMetadata,
    ) -> Result<Vec<u8>, RenderError> {
        if !self.supports(format) {
            return Err(RenderError::Unsupported(format.to_string()));
        }

        let pages = pages.to_vec();
        let meta = meta.clone();
        tokio::task::spawn_blocking(move || package(&pages, &meta))
            .await
            .map_err(|e| RenderError::Tool(format!("EPUB packaging task failed: {}", e)))?
    }

    fn supports(&self, format: ExportFormat) -> bool {
        format == ExportFormat::Epub
    }

    fn name(&self) -> &'static str {
        "epub"
    }
}

fn package(pages: &[RenderedPage], meta: &RenderMetadata) -> Result<Vec<u8>, RenderError> {
    let zip_err =
        |e: zip::result::ZipError| RenderError::Tool(format!("EPUB packaging failed: {}", e));
    let io_err = |e: std::io::Error| RenderError::Tool(format!("EPUB packaging failed: {}", e));

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let stored = FileOptions::default().compression_method(CompressionMethod::Stored);
    let deflated = FileOptions::default().compression_method(CompressionMethod::Deflated);

    // The mimetype entry must come first and stay uncompressed
    writer.start_file("mimetype", stored).map_err(zip_err)?;
    writer.write_all(b"application/epub+zip").map_err(io_err)?;

    writer.start_file("META-INF/container.xml", deflated).map_err(zip_err)?;
    writer.write_all(CONTAINER_XML.as_bytes()).map_err(io_err)?;

    writer.start_file("OEBPS/content.opf", deflated).map_err(zip_err)?;
    writer.write_all(content_opf(pages, meta).as_bytes()).map_err(io_err)?;

    writer.start_file("OEBPS/nav.xhtml", deflated).map_err(zip_err)?;
    writer.write_all(nav_xhtml(pages, meta).as_bytes()).map_err(io_err)?;

    let anchors: HashSet<&str> = pages.iter().map(|p| p.anchor.as_str()).collect();
    for page in pages {
        writer
            .start_file(format!("OEBPS/{}.xhtml", page.anchor), deflated)
            .map_err(zip_err)?;
        writer
            .write_all(page_xhtml(page, &anchors).as_bytes())
            .map_err(io_err)?;
    }

    let cursor = writer.finish().map_err(zip_err)?;
    Ok(cursor.into_inner())
}

fn content_opf(pages: &[RenderedPage], meta: &RenderMetadata) -> String {
    let mut manifest = String::from(
        "    <item id=\"nav\" href=\"nav.xhtml\" \
         media-type=\"application/xhtml+xml\" properties=\"nav\"/>\n",
    );
    let mut spine = String::new();
    for page in pages {
        manifest.push_str(&format!(
            "    <item id=\"{0}\" href=\"{0}.xhtml\" media-type=\"application/xhtml+xml\"/>\n",
            page.anchor
        ));
        spine.push_str(&format!("    <itemref idref=\"{}\"/>\n", page.anchor));
    }

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="book-id">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:identifier id="book-id">urn:wiki-export:{course}:{stamp}</dc:identifier>
    <dc:title>{title}</dc:title>
    <dc:creator>{author}</dc:creator>
    <dc:language>en</dc:language>
    <meta property="dcterms:modified">{modified}</meta>
  </metadata>
  <manifest>
{manifest}  </manifest>
  <spine>
{spine}  </spine>
</package>
"#,
        course = meta.course_id,
        stamp = meta.generated_at.timestamp(),
        title = escape_html(&meta.title),
        author = escape_html(&meta.author),
        modified = meta.generated_at.format("%Y-%m-%dT%H:%M:%SZ"),
        manifest = manifest,
        spine = spine,
    )
}

fn nav_xhtml(pages: &[RenderedPage], meta: &RenderMetadata) -> String {
    let items: String = pages
        .iter()
        .map(|p| {
            format!(
                "      <li><a href=\"{}.xhtml\">{}</a></li>\n",
                p.anchor,
                escape_html(&p.title)
            )
        })
        .collect();

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops">
<head><title>{title}</title></head>
<body>
  <nav epub:type="toc">
    <h1>{title}</h1>
    <ol>
{items}    </ol>
  </nav>
</body>
</html>
"#,
        title = escape_html(&meta.title),
        items = items,
    )
}

/// Self-close void elements and replace HTML-only named entities
fn to_xhtml(html: &str) -> String {
    let closed = VOID_ELEMENT.replace_all(html, "<$1$2 />");
    NAMED_ENTITY
        .replace_all(&closed, |caps: &regex::Captures<'_>| {
            let name = &caps[1];
            match HTML_ENTITIES.iter().find(|(n, _)| *n == name) {
                Some((_, code)) => format!("&#{};", code),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

fn page_xhtml(page: &RenderedPage, anchors: &HashSet<&str>) -> String {
    let html = to_xhtml(&page.html);
    let body = ANCHOR_HREF.replace_all(&html, |caps: &regex::Captures<'_>| {
        let anchor = &caps[1];
        if anchors.contains(anchor) {
            format!("href=\"{0}.xhtml#{0}\"", anchor)
        } else {
            caps[0].to_string()
        }
    });

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml">
<head><title>{title}</title></head>
<body>
<section id="{anchor}">
<h1>{title}</h1>
{body}
</section>
</body>
</html>
"#,
        title = escape_html(&page.title),
        anchor = page.anchor,
        body = body,
    )
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use std::io::Read;

    fn meta() -> RenderMetadata {
        RenderMetadata {
            title: "Example wiki".into(),
            course_id: 2,
            author: "Admin".into(),
            generated_at: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        }
    }

    fn pages() -> Vec<RenderedPage> {
        vec![
            RenderedPage {
                title: "Home".into(),
                anchor: "page-home".into(),
                html: "<p>See <a href=\"#page-cats\">Cats</a></p>".into(),
            },
            RenderedPage {
                title: "Cats".into(),
                anchor: "page-cats".into(),
                html: "<p>Meow <a href=\"#top\">top</a></p>".into(),
            },
        ]
    }

    fn read_entry(archive: &mut zip::ZipArchive<Cursor<Vec<u8>>>, name: &str) -> String {
        let mut file = archive.by_name(name).unwrap();
        let mut out = String::new();
        file.read_to_string(&mut out).unwrap();
        out
    }

    #[tokio::test]
    async fn test_epub_layout() {
        let bytes = EpubRenderer::new()
            .render(&pages(), ExportFormat::Epub, &meta())
            .await
            .unwrap();

        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        {
            let first = archive.by_index(0).unwrap();
            assert_eq!(first.name(), "mimetype");
            assert_eq!(first.compression(), CompressionMethod::Stored);
        }
        assert_eq!(read_entry(&mut archive, "mimetype"), "application/epub+zip");

        let opf = read_entry(&mut archive, "OEBPS/content.opf");
        let home = opf.find("<itemref idref=\"page-home\"/>").unwrap();
        let cats = opf.find("<itemref idref=\"page-cats\"/>").unwrap();
        assert!(home < cats, "spine follows page order");
        assert!(opf.contains("<dc:creator>Admin</dc:creator>"));

        let home_page = read_entry(&mut archive, "OEBPS/page-home.xhtml");
        assert!(home_page.contains("href=\"page-cats.xhtml#page-cats\""));

        let cats_page = read_entry(&mut archive, "OEBPS/page-cats.xhtml");
        assert!(cats_page.contains("href=\"#top\""), "unknown anchors stay as-is");
    }

    #[test]
    fn test_html_repaired_for_xhtml() {
        let html = concat!(
            "<p>a<br>b<BR/>c&nbsp;&amp;&mdash;&zwnj;</p>",
            "<img src=\"x.png\" alt='a>b'><hr class=\"x\">",
        );
        assert_eq!(
            to_xhtml(html),
            concat!(
                "<p>a<br />b<BR />c&#160;&amp;&#8212;&zwnj;</p>",
                "<img src=\"x.png\" alt='a>b' /><hr class=\"x\" />",
            )
        );
        // Elements that merely start with a void element's name are untouched
        assert_eq!(to_xhtml("<brand>x</brand>"), "<brand>x</brand>");
    }

    #[tokio::test]
    async fn test_pdf_unsupported() {
        let err = EpubRenderer::new()
            .render(&pages(), ExportFormat::Pdf, &meta())
            .await
            .unwrap_err();
        assert_eq!(err, RenderError::Unsupported("pdf".into()));
    }
}
