use super::{insert_page, insert_wiki, test_db};
use crate::store::WikiStore;
use crate::types::{ExportFormat, WikiId};

#[tokio::test]
async fn test_wiki_round_trip() {
    let (db, _temp_file) = test_db().await;

    let id = insert_wiki(&db, "Example wiki").await;
    let wiki = db.wiki(id).await.unwrap();

    assert_eq!(wiki.id, id);
    assert_eq!(wiki.name, "Example wiki");
    assert_eq!(wiki.first_page_title, "Home");
    assert_eq!(wiki.default_format, ExportFormat::Epub);
}

#[tokio::test]
async fn test_unknown_wiki_is_not_found() {
    let (db, _temp_file) = test_db().await;

    let result = db.wiki(WikiId(404)).await;
    assert!(matches!(result, Err(crate::Error::NotFound(_))));
}

#[tokio::test]
async fn test_duplicate_page_title_rejected() {
    let (db, _temp_file) = test_db().await;

    let id = insert_wiki(&db, "W").await;
    insert_page(&db, id, "Home", 1).await;
    let duplicate = db
        .insert_page(&crate::db::NewPage {
            wiki_id: id,
            title: "Home".into(),
            content: String::new(),
            time_modified: 2,
        })
        .await;
    assert!(duplicate.is_err());
}

#[tokio::test]
async fn test_summaries_report_newest_page() {
    let (db, _temp_file) = test_db().await;

    let first = insert_wiki(&db, "First").await;
    let empty = insert_wiki(&db, "Empty").await;
    insert_page(&db, first, "Home", 100).await;
    let page = insert_page(&db, first, "Cats", 200).await;

    let summaries = db.wiki_summaries().await.unwrap();
    assert_eq!(summaries.len(), 2);
    assert_eq!(summaries[0].wiki.id, first);
    assert_eq!(summaries[0].last_modified, Some(200));
    assert_eq!(summaries[1].wiki.id, empty);
    assert_eq!(summaries[1].last_modified, None);

    db.update_page(page, "<p>new</p>", 300).await.unwrap();
    let summaries = db.wiki_summaries().await.unwrap();
    assert_eq!(summaries[0].last_modified, Some(300));

    let pages = db.pages(first).await.unwrap();
    assert_eq!(pages.len(), 2);
    assert_eq!(pages[1].content, "<p>new</p>");
}

#[tokio::test]
async fn test_update_missing_page() {
    let (db, _temp_file) = test_db().await;

    let result = db.update_page(999, "x", 1).await;
    assert!(matches!(result, Err(crate::Error::NotFound(_))));
}
