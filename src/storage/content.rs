use chrono::{DateTime, Utc};
use rusqlite::{params, Row, ToSql};

use super::{
    enum_col, json_col, json_text, like_pattern, opt_ts, opt_ts_col, optional, to_sql_int, ts,
    ts_col, Storage,
};
use crate::error::Result;
use crate::types::{Article, ArticleKind, ArticleStatus, Category, ContentType, Tag};

const CATEGORY_COLUMNS: &str = "id, name, slug, description, parent_id, content_type, display_order, is_active";

fn map_category(row: &Row<'_>) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get(0)?,
        name: row.get(1)?,
        slug: row.get(2)?,
        description: row.get(3)?,
        parent_id: row.get(4)?,
        content_type: enum_col(row, 5, ContentType::parse)?,
        display_order: row.get(6)?,
        is_active: row.get(7)?,
    })
}

const TAG_COLUMNS: &str = "id, name, slug, description, usage_count";

fn map_tag(row: &Row<'_>) -> rusqlite::Result<Tag> {
    Ok(Tag {
        id: row.get(0)?,
        name: row.get(1)?,
        slug: row.get(2)?,
        description: row.get(3)?,
        usage_count: row.get(4)?,
    })
}

const ARTICLE_COLUMNS: &str = "id, kind, title, slug, summary, content, featured_image, category_id, tag_ids,
     author_id, author_name, status, is_featured, is_breaking, source_name, source_url, reading_time,
     views_count, likes_count, published_at, created_at, updated_at";

fn map_article(row: &Row<'_>) -> rusqlite::Result<Article> {
    Ok(Article {
        id: row.get(0)?,
        kind: enum_col(row, 1, ArticleKind::parse)?,
        title: row.get(2)?,
        slug: row.get(3)?,
        summary: row.get(4)?,
        content: row.get(5)?,
        featured_image: row.get(6)?,
        category_id: row.get(7)?,
        tag_ids: json_col(row, 8)?,
        author_id: row.get(9)?,
        author_name: row.get(10)?,
        status: enum_col(row, 11, ArticleStatus::parse)?,
        is_featured: row.get(12)?,
        is_breaking: row.get(13)?,
        source_name: row.get(14)?,
        source_url: row.get(15)?,
        reading_time: row.get(16)?,
        views_count: row.get(17)?,
        likes_count: row.get(18)?,
        published_at: opt_ts_col(row, 19)?,
        created_at: ts_col(row, 20)?,
        updated_at: ts_col(row, 21)?,
    })
}

/// Listing order for published articles.
const NEWEST_PUBLISHED: &str = "ORDER BY published_at DESC, id DESC";

impl Storage {
    // ============================================
    // Categories
    // ============================================

    fn query_categories(&self, tail: &str, params: &[&dyn ToSql]) -> Result<Vec<Category>> {
        let sql = format!("SELECT {} FROM categories {}", CATEGORY_COLUMNS, tail);
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params, map_category)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn insert_category(&self, c: &Category) -> Result<Category> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO categories (name, slug, description, parent_id, content_type, display_order, is_active)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                c.name,
                c.slug,
                c.description,
                c.parent_id,
                c.content_type.as_str(),
                c.display_order,
                c.is_active,
            ],
        )?;
        let id = conn.last_insert_rowid();
        let sql = format!("SELECT {} FROM categories WHERE id = ?1", CATEGORY_COLUMNS);
        Ok(conn.query_row(&sql, params![id], map_category)?)
    }

    pub fn update_category(&self, c: &Category) -> Result<()> {
        self.conn()?.execute(
            "UPDATE categories SET name = ?2, slug = ?3, description = ?4, parent_id = ?5, content_type = ?6,
                    display_order = ?7, is_active = ?8
             WHERE id = ?1",
            params![
                c.id,
                c.name,
                c.slug,
                c.description,
                c.parent_id,
                c.content_type.as_str(),
                c.display_order,
                c.is_active,
            ],
        )?;
        Ok(())
    }

    pub fn get_category(&self, id: i64) -> Result<Option<Category>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} FROM categories WHERE id = ?1", CATEGORY_COLUMNS);
        optional(conn.query_row(&sql, params![id], map_category))
    }

    pub fn get_category_by_slug(&self, slug: &str) -> Result<Option<Category>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} FROM categories WHERE slug = ?1", CATEGORY_COLUMNS);
        optional(conn.query_row(&sql, params![slug], map_category))
    }

    pub fn category_slug_exists(&self, slug: &str) -> Result<bool> {
        Ok(self.get_category_by_slug(slug)?.is_some())
    }

    pub fn active_categories(&self) -> Result<Vec<Category>> {
        self.query_categories("WHERE is_active = 1 ORDER BY display_order ASC, name ASC", &[])
    }

    /// Active categories of `content_type` or BOTH.
    pub fn categories_for_type(&self, content_type: ContentType) -> Result<Vec<Category>> {
        let kind = content_type.as_str();
        self.query_categories(
            "WHERE is_active = 1 AND (content_type = ?1 OR content_type = 'BOTH')
             ORDER BY display_order ASC, name ASC",
            &[&kind],
        )
    }

    pub fn root_categories(&self) -> Result<Vec<Category>> {
        self.query_categories(
            "WHERE parent_id IS NULL AND is_active = 1 ORDER BY display_order ASC, name ASC",
            &[],
        )
    }

    pub fn child_categories(&self, parent_id: i64) -> Result<Vec<Category>> {
        self.query_categories(
            "WHERE parent_id = ?1 AND is_active = 1 ORDER BY display_order ASC, name ASC",
            &[&parent_id],
        )
    }

    pub fn delete_category(&self, id: i64) -> Result<bool> {
        let conn = self.conn()?;
        conn.execute("UPDATE categories SET parent_id = NULL WHERE parent_id = ?1", params![id])?;
        conn.execute("UPDATE articles SET category_id = NULL WHERE category_id = ?1", params![id])?;
        Ok(conn.execute("DELETE FROM categories WHERE id = ?1", params![id])? > 0)
    }

    // ============================================
    // Tags
    // ============================================

    fn query_tags(&self, tail: &str, params: &[&dyn ToSql]) -> Result<Vec<Tag>> {
        let sql = format!("SELECT {} FROM tags {}", TAG_COLUMNS, tail);
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params, map_tag)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn insert_tag(&self, t: &Tag) -> Result<Tag> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO tags (name, slug, description, usage_count) VALUES (?1, ?2, ?3, 0)",
            params![t.name, t.slug, t.description],
        )?;
        let id = conn.last_insert_rowid();
        let sql = format!("SELECT {} FROM tags WHERE id = ?1", TAG_COLUMNS);
        Ok(conn.query_row(&sql, params![id], map_tag)?)
    }

    pub fn update_tag(&self, t: &Tag) -> Result<()> {
        self.conn()?.execute(
            "UPDATE tags SET name = ?2, slug = ?3, description = ?4 WHERE id = ?1",
            params![t.id, t.name, t.slug, t.description],
        )?;
        Ok(())
    }

    pub fn get_tag(&self, id: i64) -> Result<Option<Tag>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} FROM tags WHERE id = ?1", TAG_COLUMNS);
        optional(conn.query_row(&sql, params![id], map_tag))
    }

    pub fn get_tag_by_slug(&self, slug: &str) -> Result<Option<Tag>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} FROM tags WHERE slug = ?1", TAG_COLUMNS);
        optional(conn.query_row(&sql, params![slug], map_tag))
    }

    /// Case-insensitive name lookup.
    pub fn get_tag_by_name(&self, name: &str) -> Result<Option<Tag>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} FROM tags WHERE name = ?1", TAG_COLUMNS);
        optional(conn.query_row(&sql, params![name.trim()], map_tag))
    }

    pub fn tag_slug_exists(&self, slug: &str) -> Result<bool> {
        Ok(self.get_tag_by_slug(slug)?.is_some())
    }

    pub fn all_tags(&self) -> Result<Vec<Tag>> {
        self.query_tags("ORDER BY name ASC", &[])
    }

    pub fn popular_tags(&self, limit: usize) -> Result<Vec<Tag>> {
        let limit = to_sql_int(limit);
        self.query_tags("ORDER BY usage_count DESC, name ASC LIMIT ?1", &[&limit])
    }

    pub fn search_tags(&self, query: &str) -> Result<Vec<Tag>> {
        let pattern = like_pattern(query);
        self.query_tags(
            "WHERE LOWER(name) LIKE ?1 ESCAPE '\\' ORDER BY usage_count DESC, name ASC",
            &[&pattern],
        )
    }

    /// Existing ids among `ids`, in input order.
    pub fn existing_tag_ids(&self, ids: &[i64]) -> Result<Vec<i64>> {
        let mut found = Vec::with_capacity(ids.len());
        for id in ids {
            if self.get_tag(*id)?.is_some() && !found.contains(id) {
                found.push(*id);
            }
        }
        Ok(found)
    }

    /// Add `delta` to each tag's usage count, never dropping below zero.
    pub fn adjust_tag_usage(&self, ids: &[i64], delta: i64) -> Result<()> {
        let conn = self.conn()?;
        for id in ids {
            conn.execute(
                "UPDATE tags SET usage_count = MAX(0, usage_count + ?2) WHERE id = ?1",
                params![id, delta],
            )?;
        }
        Ok(())
    }

    pub fn delete_tag(&self, id: i64) -> Result<bool> {
        let conn = self.conn()?;
        // Drop the id from every article's tag list.
        conn.execute(
            "UPDATE articles SET tag_ids = (
                 SELECT COALESCE(json_group_array(value), '[]') FROM json_each(articles.tag_ids) WHERE value != ?1
             )
             WHERE EXISTS (SELECT 1 FROM json_each(articles.tag_ids) WHERE value = ?1)",
            params![id],
        )?;
        Ok(conn.execute("DELETE FROM tags WHERE id = ?1", params![id])? > 0)
    }

    // ============================================
    // Articles
    // ============================================

    fn query_articles(&self, tail: &str, params: &[&dyn ToSql]) -> Result<Vec<Article>> {
        let sql = format!("SELECT {} FROM articles {}", ARTICLE_COLUMNS, tail);
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params, map_article)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn insert_article(&self, a: &Article) -> Result<Article> {
        let tag_ids = json_text(&a.tag_ids)?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO articles (kind, title, slug, summary, content, featured_image, category_id, tag_ids,
                                   author_id, author_name, status, is_featured, is_breaking, source_name,
                                   source_url, reading_time, views_count, likes_count, published_at,
                                   created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, 0, 0, ?17, ?18, ?19)",
            params![
                a.kind.as_str(),
                a.title,
                a.slug,
                a.summary,
                a.content,
                a.featured_image,
                a.category_id,
                tag_ids,
                a.author_id,
                a.author_name,
                a.status.as_str(),
                a.is_featured,
                a.is_breaking,
                a.source_name,
                a.source_url,
                a.reading_time,
                opt_ts(&a.published_at),
                ts(&a.created_at),
                ts(&a.updated_at),
            ],
        )?;
        let id = conn.last_insert_rowid();
        let sql = format!("SELECT {} FROM articles WHERE id = ?1", ARTICLE_COLUMNS);
        Ok(conn.query_row(&sql, params![id], map_article)?)
    }

    /// Write back editable fields. View and like counters are left alone.
    pub fn update_article(&self, a: &Article) -> Result<()> {
        let tag_ids = json_text(&a.tag_ids)?;
        self.conn()?.execute(
            "UPDATE articles SET title = ?2, slug = ?3, summary = ?4, content = ?5, featured_image = ?6,
                    category_id = ?7, tag_ids = ?8, author_name = ?9, status = ?10, is_featured = ?11,
                    is_breaking = ?12, source_name = ?13, source_url = ?14, reading_time = ?15,
                    published_at = ?16, updated_at = ?17
             WHERE id = ?1",
            params![
                a.id,
                a.title,
                a.slug,
                a.summary,
                a.content,
                a.featured_image,
                a.category_id,
                tag_ids,
                a.author_name,
                a.status.as_str(),
                a.is_featured,
                a.is_breaking,
                a.source_name,
                a.source_url,
                a.reading_time,
                opt_ts(&a.published_at),
                ts(&a.updated_at),
            ],
        )?;
        Ok(())
    }

    pub fn get_article(&self, kind: ArticleKind, id: i64) -> Result<Option<Article>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} FROM articles WHERE kind = ?1 AND id = ?2", ARTICLE_COLUMNS);
        optional(conn.query_row(&sql, params![kind.as_str(), id], map_article))
    }

    pub fn get_article_by_slug(&self, kind: ArticleKind, slug: &str) -> Result<Option<Article>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} FROM articles WHERE kind = ?1 AND slug = ?2", ARTICLE_COLUMNS);
        optional(conn.query_row(&sql, params![kind.as_str(), slug], map_article))
    }

    pub fn article_slug_exists(&self, kind: ArticleKind, slug: &str) -> Result<bool> {
        Ok(self.get_article_by_slug(kind, slug)?.is_some())
    }

    pub fn delete_article(&self, kind: ArticleKind, id: i64) -> Result<bool> {
        let removed = self.conn()?.execute(
            "DELETE FROM articles WHERE kind = ?1 AND id = ?2",
            params![kind.as_str(), id],
        )?;
        Ok(removed > 0)
    }

    /// One page of published articles of `kind` narrowed by `filter`, newest
    /// first, with the total count. `filter` numbers its parameters from `?2`.
    fn published_page(
        &self,
        kind: ArticleKind,
        filter: &str,
        extra: &[&dyn ToSql],
        offset: usize,
        limit: usize,
    ) -> Result<(Vec<Article>, usize)> {
        let k = kind.as_str();
        let (offset, limit) = (to_sql_int(offset), to_sql_int(limit));
        let mut args: Vec<&dyn ToSql> = vec![&k];
        args.extend_from_slice(extra);
        let bound = args.len();
        args.push(&limit);
        args.push(&offset);

        let where_clause = format!("WHERE kind = ?1 AND status = 'PUBLISHED' {}", filter);
        let items = self.query_articles(
            &format!(
                "{} {} LIMIT ?{} OFFSET ?{}",
                where_clause,
                NEWEST_PUBLISHED,
                bound + 1,
                bound + 2
            ),
            &args,
        )?;
        let total: i64 = self.conn()?.query_row(
            &format!("SELECT COUNT(*) FROM articles {}", where_clause),
            &args[..bound],
            |row| row.get(0),
        )?;
        Ok((items, total as usize))
    }

    pub fn published_articles(
        &self,
        kind: ArticleKind,
        offset: usize,
        limit: usize,
    ) -> Result<(Vec<Article>, usize)> {
        self.published_page(kind, "", &[], offset, limit)
    }

    pub fn featured_articles(&self, kind: ArticleKind, limit: usize) -> Result<Vec<Article>> {
        let (k, limit) = (kind.as_str(), to_sql_int(limit));
        self.query_articles(
            &format!("WHERE kind = ?1 AND status = 'PUBLISHED' AND is_featured = 1 {} LIMIT ?2", NEWEST_PUBLISHED),
            &[&k, &limit],
        )
    }

    pub fn breaking_articles(&self, kind: ArticleKind) -> Result<Vec<Article>> {
        let k = kind.as_str();
        self.query_articles(
            &format!("WHERE kind = ?1 AND status = 'PUBLISHED' AND is_breaking = 1 {}", NEWEST_PUBLISHED),
            &[&k],
        )
    }

    pub fn popular_articles(&self, kind: ArticleKind, limit: usize) -> Result<Vec<Article>> {
        let (k, limit) = (kind.as_str(), to_sql_int(limit));
        self.query_articles(
            "WHERE kind = ?1 AND status = 'PUBLISHED' ORDER BY views_count DESC, id DESC LIMIT ?2",
            &[&k, &limit],
        )
    }

    pub fn recent_articles(&self, kind: ArticleKind, limit: usize) -> Result<Vec<Article>> {
        let (k, limit) = (kind.as_str(), to_sql_int(limit));
        self.query_articles(
            &format!("WHERE kind = ?1 AND status = 'PUBLISHED' {} LIMIT ?2", NEWEST_PUBLISHED),
            &[&k, &limit],
        )
    }

    pub fn articles_by_category(
        &self,
        kind: ArticleKind,
        category_id: i64,
        offset: usize,
        limit: usize,
    ) -> Result<(Vec<Article>, usize)> {
        self.published_page(kind, "AND category_id = ?2", &[&category_id], offset, limit)
    }

    pub fn articles_by_tag(
        &self,
        kind: ArticleKind,
        tag_id: i64,
        offset: usize,
        limit: usize,
    ) -> Result<(Vec<Article>, usize)> {
        self.published_page(
            kind,
            "AND EXISTS (SELECT 1 FROM json_each(articles.tag_ids) WHERE value = ?2)",
            &[&tag_id],
            offset,
            limit,
        )
    }

    /// Published articles whose title or content contains `query`.
    pub fn search_articles(
        &self,
        kind: ArticleKind,
        query: &str,
        offset: usize,
        limit: usize,
    ) -> Result<(Vec<Article>, usize)> {
        let pattern = like_pattern(query);
        self.published_page(
            kind,
            "AND (LOWER(title) LIKE ?2 ESCAPE '\\' OR LOWER(content) LIKE ?2 ESCAPE '\\')",
            &[&pattern],
            offset,
            limit,
        )
    }

    pub fn increment_article_views(&self, id: i64) -> Result<()> {
        self.conn()?
            .execute("UPDATE articles SET views_count = views_count + 1 WHERE id = ?1", params![id])?;
        Ok(())
    }

    pub fn increment_article_likes(&self, id: i64) -> Result<()> {
        self.conn()?
            .execute("UPDATE articles SET likes_count = likes_count + 1 WHERE id = ?1", params![id])?;
        Ok(())
    }

    pub fn set_article_status(
        &self,
        id: i64,
        status: ArticleStatus,
        published_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.conn()?.execute(
            "UPDATE articles SET status = ?2, published_at = COALESCE(?3, published_at), updated_at = ?4
             WHERE id = ?1",
            params![id, status.as_str(), opt_ts(&published_at), ts(&now)],
        )?;
        Ok(())
    }
}
