mod builder;
mod ordering;

use super::*;
use crate::types::WikiId;
use std::sync::Mutex;

fn page(id: i64, title: &str, content: &str) -> WikiPage {
    WikiPage {
        id,
        wiki_id: WikiId(1),
        title: title.to_string(),
        content: content.to_string(),
        time_modified: 1_700_000_000 + id,
    }
}

fn wiki() -> WikiInstance {
    WikiInstance {
        id: WikiId(1),
        course_id: 2,
        cmid: 10,
        name: "Example wiki".to_string(),
        first_page_title: "Home".to_string(),
        default_format: ExportFormat::Epub,
    }
}

fn fixed_time() -> DateTime<Utc> {
    DateTime::from_timestamp(1_760_780_000, 0).unwrap()
}

/// The "Cats / Dogs / Cows" wiki used throughout the builder tests
fn animal_pages() -> Vec<WikiPage> {
    vec![
        page(1, "Home", "<p>Info about [[Cats]], [[Dogs]] and [[Cows]]</p>"),
        page(2, "Cows", "<p>Moo.\nBack to [[Home]]</p>"),
        page(3, "Dogs", "<p>Woof. See [[Puppies|the puppies]]</p>"),
        page(4, "Cats", "<p>Meow, unlike [[Dogs]] or [[Mice]]</p>"),
        page(5, "Puppies", "<pre>\n[[not a link]]\n</pre>"),
        page(6, "Orphan", "<p>Nobody links here</p>"),
    ]
}

struct MemoryStore {
    wiki: WikiInstance,
    pages: Vec<WikiPage>,
}

#[async_trait]
impl WikiStore for MemoryStore {
    async fn wiki(&self, id: WikiId) -> Result<WikiInstance> {
        if id == self.wiki.id {
            Ok(self.wiki.clone())
        } else {
            Err(Error::NotFound(format!("wiki {}", id)))
        }
    }

    async fn pages(&self, id: WikiId) -> Result<Vec<WikiPage>> {
        Ok(self
            .pages
            .iter()
            .filter(|p| p.wiki_id == id)
            .cloned()
            .collect())
    }

    async fn wiki_summaries(&self) -> Result<Vec<crate::types::WikiSummary>> {
        Ok(Vec::new())
    }
}

/// Renderer that records what it was asked to render
#[derive(Default)]
struct RecordingRenderer {
    calls: Mutex<Vec<(Vec<RenderedPage>, ExportFormat, String)>>,
    delay: Option<Duration>,
    reject: Option<String>,
}

impl RecordingRenderer {
    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn last_pages(&self) -> Vec<RenderedPage> {
        self.calls.lock().unwrap().last().unwrap().0.clone()
    }
}

#[async_trait]
impl DocumentRenderer for RecordingRenderer {
    async fn render(
        &self,
        pages: &[RenderedPage],
        format: ExportFormat,
        meta: &RenderMetadata,
    ) -> std::result::Result<Vec<u8>, RenderError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(title) = &self.reject
            && pages.iter().any(|p| &p.title == title)
        {
            return Err(RenderError::Rejected {
                page: title.clone(),
                reason: "unsupported markup".to_string(),
            });
        }
        self.calls
            .lock()
            .unwrap()
            .push((pages.to_vec(), format, meta.author.clone()));
        Ok(pages
            .iter()
            .map(|p| p.title.as_str())
            .collect::<Vec<_>>()
            .join(",")
            .into_bytes())
    }

    fn supports(&self, _format: ExportFormat) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}
