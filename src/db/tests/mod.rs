mod wikis;

use crate::db::{Database, NewPage, NewWiki};
use crate::types::{ExportFormat, WikiId};
use tempfile::NamedTempFile;

/// Open a fresh database backed by a temporary file.
/// The file handle must be kept alive for the duration of the test.
async fn test_db() -> (Database, NamedTempFile) {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();
    (db, temp_file)
}

async fn insert_wiki(db: &Database, name: &str) -> WikiId {
    db.insert_wiki(&NewWiki {
        course_id: 2,
        cmid: 10,
        name: name.to_string(),
        first_page_title: "Home".to_string(),
        default_format: ExportFormat::Epub,
    })
    .await
    .unwrap()
}

async fn insert_page(db: &Database, wiki_id: WikiId, title: &str, modified: i64) -> i64 {
    db.insert_page(&NewPage {
        wiki_id,
        title: title.to_string(),
        content: format!("<p>{title}</p>"),
        time_modified: modified,
    })
    .await
    .unwrap()
}
