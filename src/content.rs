//! Blog posts, news items and their categories and tags.

use chrono::Utc;
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::{Arc, OnceLock};
use tracing::info;

use crate::error::{page_offset, AppError, Result, UniqueConflict};
use crate::storage::Storage;
use crate::types::{
    Actor, Article, ArticleKind, ArticleRequest, ArticleStatus, Category, CategoryRequest,
    ContentType, Page, PageRequest, Tag, TagRequest, MAX_PAGE_SIZE,
};

const WORDS_PER_MINUTE: usize = 200;

/// Lower-case, keep `[a-z0-9]`, whitespace and dashes, then join words with
/// single dashes.
pub fn slugify(text: &str) -> String {
    static STRIP: OnceLock<Option<Regex>> = OnceLock::new();
    static SPACES: OnceLock<Option<Regex>> = OnceLock::new();
    static DASHES: OnceLock<Option<Regex>> = OnceLock::new();

    let mut slug = text.trim().to_lowercase();
    if let Some(re) = STRIP.get_or_init(|| Regex::new(r"[^a-z0-9\s-]").ok()) {
        slug = re.replace_all(&slug, "").into_owned();
    }
    if let Some(re) = SPACES.get_or_init(|| Regex::new(r"\s+").ok()) {
        slug = re.replace_all(&slug, "-").into_owned();
    }
    if let Some(re) = DASHES.get_or_init(|| Regex::new(r"-+").ok()) {
        slug = re.replace_all(&slug, "-").into_owned();
    }
    slug.trim_matches('-').to_string()
}

/// `base`, or the first of `base-1`, `base-2`, ... that is free.
fn unique_slug(base: &str, taken: impl Fn(&str) -> Result<bool>) -> Result<String> {
    let base = if base.is_empty() { "item" } else { base };
    if !taken(base)? {
        return Ok(base.to_string());
    }
    let mut counter = 1;
    loop {
        let candidate = format!("{}-{}", base, counter);
        if !taken(&candidate)? {
            return Ok(candidate);
        }
        counter += 1;
    }
}

/// Minutes to read, never below one.
pub fn reading_time(content: &str) -> i32 {
    (content.split_whitespace().count() / WORDS_PER_MINUTE).max(1) as i32
}

fn clamp_limit(limit: usize) -> usize {
    limit.clamp(1, MAX_PAGE_SIZE)
}

// ============================================
// Articles
// ============================================

/// Blog or news operations, depending on the kind it was built for.
pub struct ArticleService {
    storage: Arc<Storage>,
    kind: ArticleKind,
}

impl ArticleService {
    pub fn new(storage: Arc<Storage>, kind: ArticleKind) -> Self {
        Self { storage, kind }
    }

    pub fn kind(&self) -> ArticleKind {
        self.kind
    }

    fn label(&self) -> &'static str {
        match self.kind {
            ArticleKind::Blog => "Blog post",
            ArticleKind::News => "News article",
        }
    }

    fn validate(&self, req: &ArticleRequest) -> Result<()> {
        if req.title.trim().is_empty() {
            return Err(AppError::validation("Title is required"));
        }
        if req.content.trim().is_empty() {
            return Err(AppError::validation("Content is required"));
        }
        if let Some(category_id) = req.category_id {
            if self.storage.get_category(category_id)?.is_none() {
                return Err(AppError::not_found("Category", category_id));
            }
        }
        Ok(())
    }

    fn slug_for(
        &self,
        requested: Option<&str>,
        title: &str,
        current: Option<&Article>,
    ) -> Result<String> {
        let base = slugify(requested.filter(|s| !s.trim().is_empty()).unwrap_or(title));
        if current.is_some_and(|a| a.slug == base) {
            return Ok(base);
        }
        unique_slug(&base, |s| self.storage.article_slug_exists(self.kind, s))
    }

    fn apply_request(&self, article: &mut Article, req: &ArticleRequest) {
        article.title = req.title.trim().to_string();
        article.summary = req.summary.clone();
        article.content = req.content.clone();
        article.featured_image = req.featured_image.clone();
        article.category_id = req.category_id;
        if req.author_name.is_some() {
            article.author_name = req.author_name.clone();
        }
        if let Some(featured) = req.is_featured {
            article.is_featured = featured;
        }
        match self.kind {
            ArticleKind::Blog => {
                article.reading_time = Some(reading_time(&req.content));
            }
            ArticleKind::News => {
                if let Some(breaking) = req.is_breaking {
                    article.is_breaking = breaking;
                }
                article.source_name = req.source_name.clone();
                article.source_url = req.source_url.clone();
            }
        }
    }

    pub fn create(&self, author: Actor, req: &ArticleRequest) -> Result<Article> {
        self.validate(req)?;
        let tag_ids = self.storage.existing_tag_ids(&req.tag_ids)?;
        let now = Utc::now();
        let publish = req.publish.unwrap_or(false);
        let mut article = Article {
            id: 0,
            kind: self.kind,
            title: String::new(),
            slug: self.slug_for(req.slug.as_deref(), &req.title, None)?,
            summary: None,
            content: String::new(),
            featured_image: None,
            category_id: None,
            tag_ids,
            author_id: Some(author.user_id),
            author_name: None,
            status: if publish { ArticleStatus::Published } else { ArticleStatus::Draft },
            is_featured: false,
            is_breaking: false,
            source_name: None,
            source_url: None,
            reading_time: None,
            views_count: 0,
            likes_count: 0,
            published_at: publish.then_some(now),
            created_at: now,
            updated_at: now,
        };
        self.apply_request(&mut article, req);

        let saved = self
            .storage
            .insert_article(&article)
            .or_conflict(format!("{} slug already exists: {}", self.label(), article.slug))?;
        self.storage.adjust_tag_usage(&saved.tag_ids, 1)?;
        info!(kind = %self.kind, id = saved.id, slug = %saved.slug, status = %saved.status, "article created");
        Ok(saved)
    }

    pub fn update(&self, id: i64, req: &ArticleRequest) -> Result<Article> {
        self.validate(req)?;
        let mut article = self.get(id, false)?;
        article.slug = self.slug_for(req.slug.as_deref(), &req.title, Some(&article))?;
        self.apply_request(&mut article, req);

        let old: BTreeSet<i64> = article.tag_ids.iter().copied().collect();
        let new: BTreeSet<i64> = self.storage.existing_tag_ids(&req.tag_ids)?.into_iter().collect();
        let removed: Vec<i64> = old.difference(&new).copied().collect();
        let added: Vec<i64> = new.difference(&old).copied().collect();
        article.tag_ids = new.into_iter().collect();
        article.updated_at = Utc::now();

        self.storage
            .update_article(&article)
            .or_conflict(format!("{} slug already exists: {}", self.label(), article.slug))?;
        self.storage.adjust_tag_usage(&removed, -1)?;
        self.storage.adjust_tag_usage(&added, 1)?;
        info!(kind = %self.kind, id, "article updated");
        Ok(article)
    }

    /// With `public` set, unpublished articles read as missing.
    pub fn get(&self, id: i64, public: bool) -> Result<Article> {
        self.storage
            .get_article(self.kind, id)?
            .filter(|a| !public || a.status == ArticleStatus::Published)
            .ok_or_else(|| AppError::not_found(self.label(), id))
    }

    /// Public read by slug. Counts a view.
    pub fn get_by_slug(&self, slug: &str, public: bool) -> Result<Article> {
        let mut article = self
            .storage
            .get_article_by_slug(self.kind, slug)?
            .filter(|a| !public || a.status == ArticleStatus::Published)
            .ok_or_else(|| AppError::NotFound(format!("{} not found with slug: {}", self.label(), slug)))?;
        self.storage.increment_article_views(article.id)?;
        article.views_count += 1;
        Ok(article)
    }

    /// Run a paged storage query for `page`/`size`.
    fn page_of(
        &self,
        page: usize,
        size: usize,
        fetch: impl FnOnce(usize, usize) -> Result<(Vec<Article>, usize)>,
    ) -> Result<Page<Article>> {
        let req = PageRequest::new(page, size);
        let (items, total) = fetch(page_offset(&req)?, req.size)?;
        Ok(Page::new(items, req.page, req.size, total))
    }

    pub fn list_published(&self, page: usize, size: usize) -> Result<Page<Article>> {
        self.page_of(page, size, |offset, limit| {
            self.storage.published_articles(self.kind, offset, limit)
        })
    }

    pub fn featured(&self, limit: usize) -> Result<Vec<Article>> {
        self.storage.featured_articles(self.kind, clamp_limit(limit))
    }

    pub fn popular(&self, limit: usize) -> Result<Vec<Article>> {
        self.storage.popular_articles(self.kind, clamp_limit(limit))
    }

    pub fn recent(&self, limit: usize) -> Result<Vec<Article>> {
        self.storage.recent_articles(self.kind, clamp_limit(limit))
    }

    pub fn breaking(&self) -> Result<Vec<Article>> {
        self.storage.breaking_articles(self.kind)
    }

    pub fn by_category(&self, category_id: i64, page: usize, size: usize) -> Result<Page<Article>> {
        self.page_of(page, size, |offset, limit| {
            self.storage.articles_by_category(self.kind, category_id, offset, limit)
        })
    }

    pub fn by_tag(&self, tag_id: i64, page: usize, size: usize) -> Result<Page<Article>> {
        self.page_of(page, size, |offset, limit| {
            self.storage.articles_by_tag(self.kind, tag_id, offset, limit)
        })
    }

    pub fn search(&self, query: &str, page: usize, size: usize) -> Result<Page<Article>> {
        let query = query.trim();
        if query.is_empty() {
            let req = PageRequest::new(page, size);
            return Ok(Page::new(Vec::new(), req.page, req.size, 0));
        }
        self.page_of(page, size, |offset, limit| {
            self.storage.search_articles(self.kind, query, offset, limit)
        })
    }

    pub fn publish(&self, id: i64) -> Result<Article> {
        self.get(id, false)?;
        self.storage
            .set_article_status(id, ArticleStatus::Published, Some(Utc::now()), Utc::now())?;
        info!(kind = %self.kind, id, "article published");
        self.get(id, false)
    }

    pub fn archive(&self, id: i64) -> Result<Article> {
        self.get(id, false)?;
        self.storage.set_article_status(id, ArticleStatus::Archived, None, Utc::now())?;
        self.get(id, false)
    }

    pub fn set_featured(&self, id: i64, featured: bool) -> Result<Article> {
        let mut article = self.get(id, false)?;
        article.is_featured = featured;
        article.updated_at = Utc::now();
        self.storage.update_article(&article)?;
        Ok(article)
    }

    /// News only.
    pub fn set_breaking(&self, id: i64, breaking: bool) -> Result<Article> {
        if self.kind != ArticleKind::News {
            return Err(AppError::validation("Only news articles can be marked as breaking"));
        }
        let mut article = self.get(id, false)?;
        article.is_breaking = breaking;
        article.updated_at = Utc::now();
        self.storage.update_article(&article)?;
        info!(kind = %self.kind, id, breaking, "breaking flag changed");
        Ok(article)
    }

    pub fn like(&self, id: i64) -> Result<Article> {
        if self.kind != ArticleKind::Blog {
            return Err(AppError::validation("Only blog posts can be liked"));
        }
        let mut article = self.get(id, true)?;
        self.storage.increment_article_likes(id)?;
        article.likes_count += 1;
        Ok(article)
    }

    pub fn delete(&self, id: i64) -> Result<()> {
        let article = self.get(id, false)?;
        self.storage.delete_article(self.kind, id)?;
        self.storage.adjust_tag_usage(&article.tag_ids, -1)?;
        info!(kind = %self.kind, id, "article deleted");
        Ok(())
    }
}

// ============================================
// Categories
// ============================================

pub struct CategoryService {
    storage: Arc<Storage>,
}

impl CategoryService {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }

    fn parse_type(raw: Option<&str>) -> Result<ContentType> {
        match raw.map(str::trim).filter(|t| !t.is_empty()) {
            Some(t) => ContentType::parse(t).ok_or_else(|| AppError::validation(format!("Invalid content type: {}", t))),
            None => Ok(ContentType::Both),
        }
    }

    fn check_parent(&self, parent_id: Option<i64>, own_id: Option<i64>) -> Result<()> {
        let Some(parent_id) = parent_id else {
            return Ok(());
        };
        if Some(parent_id) == own_id {
            return Err(AppError::validation("A category cannot be its own parent"));
        }
        if self.storage.get_category(parent_id)?.is_none() {
            return Err(AppError::not_found("Category", parent_id));
        }
        Ok(())
    }

    pub fn create(&self, req: &CategoryRequest) -> Result<Category> {
        if req.name.trim().is_empty() {
            return Err(AppError::validation("Category name is required"));
        }
        self.check_parent(req.parent_id, None)?;
        let slug = unique_slug(&slugify(&req.name), |s| self.storage.category_slug_exists(s))?;
        let saved = self
            .storage
            .insert_category(&Category {
                id: 0,
                name: req.name.trim().to_string(),
                slug,
                description: req.description.clone(),
                parent_id: req.parent_id,
                content_type: Self::parse_type(req.content_type.as_deref())?,
                display_order: req.display_order.unwrap_or(0),
                is_active: true,
            })
            .or_conflict(format!("Category already exists: {}", req.name.trim()))?;
        info!(id = saved.id, slug = %saved.slug, "category created");
        Ok(saved)
    }

    pub fn update(&self, id: i64, req: &CategoryRequest) -> Result<Category> {
        if req.name.trim().is_empty() {
            return Err(AppError::validation("Category name is required"));
        }
        let mut category = self.get(id)?;
        self.check_parent(req.parent_id, Some(id))?;
        let base = slugify(&req.name);
        if base != category.slug {
            category.slug = unique_slug(&base, |s| self.storage.category_slug_exists(s))?;
        }
        category.name = req.name.trim().to_string();
        category.description = req.description.clone();
        category.parent_id = req.parent_id;
        if req.content_type.is_some() {
            category.content_type = Self::parse_type(req.content_type.as_deref())?;
        }
        if let Some(order) = req.display_order {
            category.display_order = order;
        }
        self.storage
            .update_category(&category)
            .or_conflict(format!("Category already exists: {}", category.name))?;
        Ok(category)
    }

    pub fn get(&self, id: i64) -> Result<Category> {
        self.storage
            .get_category(id)?
            .ok_or_else(|| AppError::not_found("Category", id))
    }

    pub fn get_by_slug(&self, slug: &str) -> Result<Category> {
        self.storage
            .get_category_by_slug(slug)?
            .ok_or_else(|| AppError::NotFound(format!("Category not found with slug: {}", slug)))
    }

    pub fn active(&self) -> Result<Vec<Category>> {
        self.storage.active_categories()
    }

    pub fn for_type(&self, content_type: &str) -> Result<Vec<Category>> {
        self.storage.categories_for_type(Self::parse_type(Some(content_type))?)
    }

    pub fn roots(&self) -> Result<Vec<Category>> {
        self.storage.root_categories()
    }

    pub fn children(&self, parent_id: i64) -> Result<Vec<Category>> {
        self.storage.child_categories(parent_id)
    }

    pub fn toggle_active(&self, id: i64) -> Result<Category> {
        let mut category = self.get(id)?;
        category.is_active = !category.is_active;
        self.storage.update_category(&category)?;
        Ok(category)
    }

    pub fn delete(&self, id: i64) -> Result<()> {
        if !self.storage.delete_category(id)? {
            return Err(AppError::not_found("Category", id));
        }
        info!(id, "category deleted");
        Ok(())
    }
}

// ============================================
// Tags
// ============================================

pub struct TagService {
    storage: Arc<Storage>,
}

impl TagService {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }

    pub fn create(&self, req: &TagRequest) -> Result<Tag> {
        let name = req.name.trim();
        if name.is_empty() {
            return Err(AppError::validation("Tag name is required"));
        }
        if self.storage.get_tag_by_name(name)?.is_some() {
            return Err(AppError::Conflict(format!("Tag already exists: {}", name)));
        }
        let slug = unique_slug(&slugify(name), |s| self.storage.tag_slug_exists(s))?;
        self.storage
            .insert_tag(&Tag {
                id: 0,
                name: name.to_string(),
                slug,
                description: req.description.clone(),
                usage_count: 0,
            })
            .or_conflict(format!("Tag already exists: {}", name))
    }

    pub fn get_or_create(&self, name: &str) -> Result<Tag> {
        match self.storage.get_tag_by_name(name.trim())? {
            Some(tag) => Ok(tag),
            None => self.create(&TagRequest {
                name: name.to_string(),
                description: None,
            }),
        }
    }

    pub fn update(&self, id: i64, req: &TagRequest) -> Result<Tag> {
        let name = req.name.trim();
        if name.is_empty() {
            return Err(AppError::validation("Tag name is required"));
        }
        let mut tag = self.get(id)?;
        if self.storage.get_tag_by_name(name)?.is_some_and(|other| other.id != id) {
            return Err(AppError::Conflict(format!("Tag already exists: {}", name)));
        }
        let base = slugify(name);
        if base != tag.slug {
            tag.slug = unique_slug(&base, |s| self.storage.tag_slug_exists(s))?;
        }
        tag.name = name.to_string();
        tag.description = req.description.clone();
        self.storage
            .update_tag(&tag)
            .or_conflict(format!("Tag already exists: {}", name))?;
        Ok(tag)
    }

    pub fn get(&self, id: i64) -> Result<Tag> {
        self.storage.get_tag(id)?.ok_or_else(|| AppError::not_found("Tag", id))
    }

    pub fn get_by_slug(&self, slug: &str) -> Result<Tag> {
        self.storage
            .get_tag_by_slug(slug)?
            .ok_or_else(|| AppError::NotFound(format!("Tag not found with slug: {}", slug)))
    }

    pub fn all(&self) -> Result<Vec<Tag>> {
        self.storage.all_tags()
    }

    pub fn popular(&self, limit: usize) -> Result<Vec<Tag>> {
        self.storage.popular_tags(limit)
    }

    pub fn search(&self, query: &str) -> Result<Vec<Tag>> {
        self.storage.search_tags(query.trim())
    }

    pub fn delete(&self, id: i64) -> Result<()> {
        if !self.storage.delete_tag(id)? {
            return Err(AppError::not_found("Tag", id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;

    const ADMIN: Actor = Actor {
        user_id: 1,
        role: Role::Admin,
    };

    fn storage() -> Arc<Storage> {
        Arc::new(Storage::open_in_memory().unwrap())
    }

    fn post(title: &str, tags: Vec<i64>) -> ArticleRequest {
        ArticleRequest {
            title: title.into(),
            content: "Scholarship interviews reward preparation. ".repeat(100),
            tag_ids: tags,
            ..Default::default()
        }
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("  Hello, World!  "), "hello-world");
        assert_eq!(slugify("A -- B   c"), "a-b-c");
        assert_eq!(slugify("Top 10 Scholarships (2025)"), "top-10-scholarships-2025");
        assert_eq!(slugify("---"), "");
    }

    #[test]
    fn test_reading_time() {
        assert_eq!(reading_time(""), 1);
        assert_eq!(reading_time(&"word ".repeat(199)), 1);
        assert_eq!(reading_time(&"word ".repeat(650)), 3);
    }

    #[test]
    fn test_duplicate_titles_get_suffixes() {
        let blogs = ArticleService::new(storage(), ArticleKind::Blog);
        let first = blogs.create(ADMIN, &post("Study in Japan", vec![])).unwrap();
        let second = blogs.create(ADMIN, &post("Study in Japan", vec![])).unwrap();
        let third = blogs.create(ADMIN, &post("Study in Japan", vec![])).unwrap();
        assert_eq!(first.slug, "study-in-japan");
        assert_eq!(second.slug, "study-in-japan-1");
        assert_eq!(third.slug, "study-in-japan-2");
        assert_eq!(first.status, ArticleStatus::Draft);
        assert_eq!(first.reading_time, Some(2));
    }

    #[test]
    fn test_tag_usage_follows_articles() {
        let storage = storage();
        let tags = TagService::new(storage.clone());
        let visa = tags.create(&TagRequest { name: "Visa".into(), description: None }).unwrap();
        let ielts = tags.get_or_create("IELTS").unwrap();
        assert!(matches!(
            tags.create(&TagRequest { name: "visa".into(), description: None }),
            Err(AppError::Conflict(_))
        ));

        let blogs = ArticleService::new(storage, ArticleKind::Blog);
        let article = blogs.create(ADMIN, &post("Visa tips", vec![visa.id, visa.id, 999])).unwrap();
        assert_eq!(article.tag_ids, vec![visa.id]);
        assert_eq!(tags.get(visa.id).unwrap().usage_count, 1);

        blogs.update(article.id, &post("Visa tips", vec![ielts.id])).unwrap();
        assert_eq!(tags.get(visa.id).unwrap().usage_count, 0);
        assert_eq!(tags.get(ielts.id).unwrap().usage_count, 1);

        blogs.delete(article.id).unwrap();
        assert_eq!(tags.get(ielts.id).unwrap().usage_count, 0);
    }

    #[test]
    fn test_public_reads_only_published() {
        let news = ArticleService::new(storage(), ArticleKind::News);
        let draft = news.create(ADMIN, &post("Deadline extended", vec![])).unwrap();
        assert!(matches!(news.get_by_slug(&draft.slug, true), Err(AppError::NotFound(_))));
        assert_eq!(news.list_published(0, 10).unwrap().total_elements, 0);

        let published = news.publish(draft.id).unwrap();
        assert_eq!(published.status, ArticleStatus::Published);
        assert!(published.published_at.is_some());
        let read = news.get_by_slug(&draft.slug, true).unwrap();
        assert_eq!(read.views_count, 1);
        assert_eq!(news.list_published(0, 10).unwrap().total_elements, 1);
        assert_eq!(news.search("deadline", 0, 10).unwrap().total_elements, 1);
        assert!(news.like(draft.id).is_err());

        news.archive(draft.id).unwrap();
        assert!(news.get(draft.id, true).is_err());
        assert!(news.get(draft.id, false).is_ok());
    }

    #[test]
    fn test_likes_and_featured() {
        let blogs = ArticleService::new(storage(), ArticleKind::Blog);
        let mut req = post("Writing a strong essay", vec![]);
        req.publish = Some(true);
        let article = blogs.create(ADMIN, &req).unwrap();
        assert_eq!(blogs.like(article.id).unwrap().likes_count, 1);
        blogs.set_featured(article.id, true).unwrap();
        assert_eq!(blogs.featured(5).unwrap().len(), 1);
        assert_eq!(blogs.recent(5).unwrap()[0].id, article.id);
    }

    #[test]
    fn test_out_of_range_page_is_rejected() {
        let blogs = ArticleService::new(storage(), ArticleKind::Blog);
        let err = blogs.list_published(usize::MAX / 2, 10).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(blogs.search("essay", usize::MAX, 10).is_err());

        let empty = blogs.list_published(i64::MAX as usize / 100, 100).unwrap();
        assert!(empty.content.is_empty());
        assert!(empty.last);
        assert_eq!(blogs.list_published(0, 0).unwrap().size, 1);
    }

    #[test]
    fn test_filtered_lists_are_paged() {
        let storage = storage();
        let tags = TagService::new(storage.clone());
        let visa = tags.get_or_create("Visa").unwrap();
        let news = ArticleService::new(storage, ArticleKind::News);
        for i in 0..3 {
            let mut req = post(&format!("Visa rules update {}", i), vec![visa.id]);
            req.publish = Some(true);
            news.create(ADMIN, &req).unwrap();
        }

        let first = news.by_tag(visa.id, 0, 2).unwrap();
        assert_eq!((first.content.len(), first.total_elements, first.total_pages), (2, 3, 2));
        assert!(!first.last);
        let second = news.by_tag(visa.id, 1, 2).unwrap();
        assert_eq!(second.content.len(), 1);
        assert!(second.last);

        assert_eq!(news.search("rules", 1, 2).unwrap().content.len(), 1);
        assert_eq!(news.search("   ", 0, 2).unwrap().total_elements, 0);
        assert_eq!(news.by_category(42, 0, 10).unwrap().total_elements, 0);
    }

    #[test]
    fn test_breaking_flag_is_news_only() {
        let storage = storage();
        let news = ArticleService::new(storage.clone(), ArticleKind::News);
        let mut req = post("Embassy closes early", vec![]);
        req.publish = Some(true);
        let item = news.create(ADMIN, &req).unwrap();
        assert!(!item.is_breaking);

        assert!(news.set_breaking(item.id, true).unwrap().is_breaking);
        assert_eq!(news.breaking().unwrap().len(), 1);
        news.set_breaking(item.id, false).unwrap();
        assert!(news.breaking().unwrap().is_empty());

        let blogs = ArticleService::new(storage, ArticleKind::Blog);
        let essay = blogs.create(ADMIN, &post("Essay tips", vec![])).unwrap();
        assert!(matches!(blogs.set_breaking(essay.id, true), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_categories() {
        let categories = CategoryService::new(storage());
        let guides = categories
            .create(&CategoryRequest {
                name: "Guides".into(),
                content_type: Some("blog".into()),
                ..Default::default()
            })
            .unwrap();
        let child = categories
            .create(&CategoryRequest {
                name: "Visa Guides".into(),
                parent_id: Some(guides.id),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(child.content_type, ContentType::Both);
        assert_eq!(categories.children(guides.id).unwrap().len(), 1);
        assert_eq!(categories.roots().unwrap().len(), 1);
        assert_eq!(categories.for_type("news").unwrap().len(), 1);
        assert!(categories.create(&CategoryRequest::default()).is_err());
        assert!(categories.for_type("video").is_err());

        let hidden = categories.toggle_active(child.id).unwrap();
        assert!(!hidden.is_active);
        assert_eq!(categories.active().unwrap().len(), 1);

        categories.delete(guides.id).unwrap();
        assert_eq!(categories.get(child.id).unwrap().parent_id, None);
        assert!(matches!(categories.delete(guides.id), Err(AppError::NotFound(_))));
    }
}
