//! Wiki instance and page storage.

use async_trait::async_trait;

use crate::store::WikiStore;
use crate::types::{WikiId, WikiInstance, WikiPage, WikiSummary};
use crate::{Error, Result};

use super::{Database, NewPage, NewWiki, PageRow, WikiRow};

/// Row returned by the summary query
#[derive(sqlx::FromRow)]
struct SummaryRow {
    id: i64,
    course_id: i64,
    cmid: i64,
    name: String,
    first_page_title: String,
    default_format: String,
    last_modified: Option<i64>,
}

impl Database {
    /// Insert a wiki instance
    pub async fn insert_wiki(&self, wiki: &NewWiki) -> Result<WikiId> {
        let result = sqlx::query(
            r#"
            INSERT INTO wikis (course_id, cmid, name, first_page_title, default_format)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(wiki.course_id)
        .bind(wiki.cmid)
        .bind(&wiki.name)
        .bind(&wiki.first_page_title)
        .bind(wiki.default_format.extension())
        .execute(&self.pool)
        .await
        .map_err(Error::Sqlx)?;

        Ok(WikiId(result.last_insert_rowid()))
    }

    /// Insert a page
    ///
    /// Titles are unique per wiki; inserting a duplicate title fails.
    pub async fn insert_page(&self, page: &NewPage) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO wiki_pages (wiki_id, title, content, time_modified)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(page.wiki_id.get())
        .bind(&page.title)
        .bind(&page.content)
        .bind(page.time_modified)
        .execute(&self.pool)
        .await
        .map_err(Error::Sqlx)?;

        Ok(result.last_insert_rowid())
    }

    /// Replace a page's content and bump its modification time
    pub async fn update_page(&self, page_id: i64, content: &str, time_modified: i64) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE wiki_pages SET content = ?, time_modified = ? WHERE id = ?
            "#,
        )
        .bind(content)
        .bind(time_modified)
        .bind(page_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Sqlx)?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("page {}", page_id)));
        }
        Ok(())
    }
}

#[async_trait]
impl WikiStore for Database {
    async fn wiki(&self, id: WikiId) -> Result<WikiInstance> {
        let row = sqlx::query_as::<_, WikiRow>(
            r#"
            SELECT id, course_id, cmid, name, first_page_title, default_format
            FROM wikis
            WHERE id = ?
            "#,
        )
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Sqlx)?;

        row.map(WikiInstance::from)
            .ok_or_else(|| Error::NotFound(format!("wiki {}", id)))
    }

    async fn pages(&self, id: WikiId) -> Result<Vec<WikiPage>> {
        let rows = sqlx::query_as::<_, PageRow>(
            r#"
            SELECT id, wiki_id, title, content, time_modified
            FROM wiki_pages
            WHERE wiki_id = ?
            ORDER BY id
            "#,
        )
        .bind(id.get())
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Sqlx)?;

        Ok(rows.into_iter().map(WikiPage::from).collect())
    }

    async fn wiki_summaries(&self) -> Result<Vec<WikiSummary>> {
        let rows = sqlx::query_as::<_, SummaryRow>(
            r#"
            SELECT w.id, w.course_id, w.cmid, w.name, w.first_page_title, w.default_format,
                   MAX(p.time_modified) AS last_modified
            FROM wikis w
            LEFT JOIN wiki_pages p ON p.wiki_id = w.id
            GROUP BY w.id
            ORDER BY w.id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Sqlx)?;

        Ok(rows
            .into_iter()
            .map(|row| WikiSummary {
                last_modified: row.last_modified,
                wiki: WikiRow {
                    id: row.id,
                    course_id: row.course_id,
                    cmid: row.cmid,
                    name: row.name,
                    first_page_title: row.first_page_title,
                    default_format: row.default_format,
                }
                .into(),
            })
            .collect())
    }
}
