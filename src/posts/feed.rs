use serde::Serialize;
use sqlx::SqlitePool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    db::{count_to_u64, from_micros, parse_uuid, to_micros},
    error::{CoreError, CoreResult},
    pagination::{Page, PageRequest},
    permissions::{Permissions, permission_required},
    users::{User, UserSummary},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub id: Uuid,
    pub author_id: Uuid,
    pub body: String,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostSummary {
    pub id: Uuid,
    pub author: UserSummary,
    pub body: String,
    pub body_html: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

pub fn render_markdown(body: &str) -> String {
    let mut body_html = String::new();
    pulldown_cmark::html::push_html(&mut body_html, pulldown_cmark::Parser::new(body));
    body_html
}

/// Which posts a listing covers.
enum Scope {
    All,
    Author(Uuid),
    /// The reader's own posts and those of everyone they follow.
    FollowedBy(Uuid),
}

impl Scope {
    fn filter(&self) -> &'static str {
        match self {
            Scope::All => "",
            Scope::Author(_) => "WHERE p.author_id=?1",
            Scope::FollowedBy(_) => {
                "WHERE p.author_id=?1 OR p.author_id IN (SELECT followed_id FROM follows WHERE follower_id=?1)"
            }
        }
    }

    fn user(&self) -> Option<String> {
        match self {
            Scope::All => None,
            Scope::Author(id) | Scope::FollowedBy(id) => Some(id.to_string()),
        }
    }
}

#[tracing::instrument(skip(db_pool, author, body), fields(author = %author.username))]
pub async fn create_post(
    db_pool: &SqlitePool,
    author: &User,
    body: &str,
    now: OffsetDateTime,
) -> CoreResult<Post> {
    permission_required(author, Permissions::WRITE)?;
    if body.trim().is_empty() {
        return Err(CoreError::EmptyContent);
    }

    let post = Post {
        id: Uuid::now_v7(),
        author_id: author.id,
        body: body.to_owned(),
        created_at: now,
    };
    sqlx::query("INSERT INTO posts (id,author_id,body,created_at) VALUES (?,?,?,?)")
        .bind(post.id.to_string())
        .bind(post.author_id.to_string())
        .bind(&post.body)
        .bind(to_micros(post.created_at))
        .execute(db_pool)
        .await?;

    tracing::info!(post = %post.id, "post saved");
    Ok(post)
}

pub async fn find_post(db_pool: &SqlitePool, post_id: Uuid) -> CoreResult<Option<Post>> {
    let row: Option<(String, String, String, i64)> =
        sqlx::query_as("SELECT id,author_id,body,created_at FROM posts WHERE id=?")
            .bind(post_id.to_string())
            .fetch_optional(db_pool)
            .await?;
    row.map(|(id, author_id, body, created_at)| {
        Ok(Post {
            id: parse_uuid(&id)?,
            author_id: parse_uuid(&author_id)?,
            body,
            created_at: from_micros(created_at)?,
        })
    })
    .transpose()
}

/// Replace the body in place. The creation time, and so the feed position, stays.
#[tracing::instrument(skip(db_pool, editor, new_body), fields(editor = %editor.username))]
pub async fn edit_post(
    db_pool: &SqlitePool,
    editor: &User,
    post_id: Uuid,
    new_body: &str,
) -> CoreResult<Post> {
    let Some(post) = find_post(db_pool, post_id).await? else {
        return Err(CoreError::NotFound("post"));
    };
    if post.author_id != editor.id {
        tracing::warn!("edit by non-author rejected");
        return Err(CoreError::Forbidden("post"));
    }
    if new_body.trim().is_empty() {
        return Err(CoreError::EmptyContent);
    }

    sqlx::query("UPDATE posts SET body=? WHERE id=? AND author_id=?")
        .bind(new_body)
        .bind(post.id.to_string())
        .bind(editor.id.to_string())
        .execute(db_pool)
        .await?;

    tracing::info!("post updated");
    Ok(Post {
        body: new_body.to_owned(),
        ..post
    })
}

pub async fn list_posts_global(db_pool: &SqlitePool, request: PageRequest) -> CoreResult<Page<PostSummary>> {
    list_posts(db_pool, Scope::All, request).await
}

pub async fn list_posts_by_user(
    db_pool: &SqlitePool,
    author: &User,
    request: PageRequest,
) -> CoreResult<Page<PostSummary>> {
    list_posts(db_pool, Scope::Author(author.id), request).await
}

pub async fn list_posts_followed(
    db_pool: &SqlitePool,
    reader: &User,
    request: PageRequest,
) -> CoreResult<Page<PostSummary>> {
    list_posts(db_pool, Scope::FollowedBy(reader.id), request).await
}

/// Newest first; posts created at the same instant keep insertion order reversed.
async fn list_posts(db_pool: &SqlitePool, scope: Scope, request: PageRequest) -> CoreResult<Page<PostSummary>> {
    let filter = scope.filter();
    let user = scope.user();
    let mut tx = db_pool.begin().await?;

    let count_sql = format!("SELECT COUNT(*) FROM posts p {filter}");
    let mut count = sqlx::query_as::<_, (i64,)>(&count_sql);
    if let Some(user) = &user {
        count = count.bind(user);
    }
    let (total,) = count.fetch_one(&mut *tx).await?;

    let sql = format!(
        "SELECT p.id,p.body,p.created_at,u.id,u.username,u.name FROM posts p \
         JOIN users u ON u.id=p.author_id \
         {filter} \
         ORDER BY p.created_at DESC, p.rowid DESC \
         LIMIT ?2 OFFSET ?3"
    );
    let mut page = sqlx::query_as::<_, (String, String, i64, String, String, String)>(&sql);
    // keep ?2/?3 numbered the same whether or not ?1 is used
    page = page.bind(user.clone().unwrap_or_default());
    let rows = page
        .bind(i64::try_from(request.limit()).unwrap_or(i64::MAX))
        .bind(i64::try_from(request.offset()).unwrap_or(i64::MAX))
        .fetch_all(&mut *tx)
        .await?;
    tx.commit().await?;

    let items = rows
        .into_iter()
        .map(|(id, body, created_at, author_id, username, name)| {
            Ok(PostSummary {
                id: parse_uuid(&id)?,
                author: UserSummary { id: parse_uuid(&author_id)?, username, name },
                body_html: render_markdown(&body),
                body,
                created_at: from_micros(created_at)?,
            })
        })
        .collect::<CoreResult<Vec<_>>>()?;

    tracing::debug!(page = request.page(), count = items.len(), "listed posts");
    Ok(Page::from_parts(items, request, count_to_u64(total)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::test_support::{at, pool, user, user_with_role},
        follows,
        permissions::Role,
    };

    fn bodies(page: &Page<PostSummary>) -> Vec<&str> {
        page.items.iter().map(|p| p.body.as_str()).collect()
    }

    #[tokio::test]
    async fn user_posts_newest_first() {
        let db_pool = pool().await;
        let u = user(&db_pool, "writer").await;
        create_post(&db_pool, &u, "P1", at(1)).await.unwrap();
        create_post(&db_pool, &u, "P2", at(2)).await.unwrap();
        create_post(&db_pool, &u, "P3", at(3)).await.unwrap();

        let first = list_posts_by_user(&db_pool, &u, PageRequest::new(1, 2)).await.unwrap();
        assert_eq!(bodies(&first), ["P3", "P2"]);
        assert!(first.has_next);
        assert!(!first.has_prev);

        let second = list_posts_by_user(&db_pool, &u, PageRequest::new(2, 2)).await.unwrap();
        assert_eq!(bodies(&second), ["P1"]);
        assert!(!second.has_next);
        assert!(second.has_prev);
    }

    #[tokio::test]
    async fn global_listing_is_stable_and_forgiving() {
        let db_pool = pool().await;
        let a = user(&db_pool, "alice").await;
        let b = user(&db_pool, "bob").await;
        create_post(&db_pool, &a, "one", at(1)).await.unwrap();
        create_post(&db_pool, &b, "two", at(2)).await.unwrap();
        create_post(&db_pool, &a, "three", at(2)).await.unwrap();

        let once = list_posts_global(&db_pool, PageRequest::new(1, 5)).await.unwrap();
        let twice = list_posts_global(&db_pool, PageRequest::new(1, 5)).await.unwrap();
        assert_eq!(once, twice);
        assert_eq!(bodies(&once), ["three", "two", "one"]);
        assert_eq!(once.items[1].author.username, "bob");

        let far = list_posts_global(&db_pool, PageRequest::new(999_999, 5)).await.unwrap();
        assert!(far.items.is_empty());
        assert!(!far.has_next);
        assert_eq!(far.total, 3);
    }

    #[tokio::test]
    async fn empty_body_rejected() {
        let db_pool = pool().await;
        let u = user(&db_pool, "writer").await;
        assert!(matches!(create_post(&db_pool, &u, "  \n", at(1)).await, Err(CoreError::EmptyContent)));
        assert_eq!(list_posts_global(&db_pool, PageRequest::new(1, 5)).await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn suspended_users_cannot_write() {
        let db_pool = pool().await;
        let u = user_with_role(&db_pool, "quiet", Role::Suspended).await;
        let err = create_post(&db_pool, &u, "hi", at(1)).await.unwrap_err();
        assert!(matches!(err, CoreError::Unauthorized { needed } if needed == Permissions::WRITE));
    }

    #[tokio::test]
    async fn only_the_author_edits() {
        let db_pool = pool().await;
        let author = user(&db_pool, "author").await;
        let other = user(&db_pool, "other").await;
        let post = create_post(&db_pool, &author, "original", at(5)).await.unwrap();

        let err = edit_post(&db_pool, &other, post.id, "hijacked").await.unwrap_err();
        assert!(matches!(err, CoreError::Forbidden(_)));
        assert_eq!(find_post(&db_pool, post.id).await.unwrap().unwrap().body, "original");

        let edited = edit_post(&db_pool, &author, post.id, "*revised*").await.unwrap();
        assert_eq!(edited.created_at, at(5));
        let listed = list_posts_global(&db_pool, PageRequest::new(1, 5)).await.unwrap();
        assert_eq!(listed.items[0].body, "*revised*");
        assert_eq!(listed.items[0].body_html, "<p><em>revised</em></p>\n");
        assert_eq!(listed.items[0].created_at, at(5));
    }

    #[tokio::test]
    async fn edit_missing_post() {
        let db_pool = pool().await;
        let author = user(&db_pool, "author").await;
        let err = edit_post(&db_pool, &author, Uuid::now_v7(), "text").await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound("post")));
    }

    #[tokio::test]
    async fn edits_keep_feed_order() {
        let db_pool = pool().await;
        let u = user(&db_pool, "writer").await;
        let old = create_post(&db_pool, &u, "old", at(1)).await.unwrap();
        create_post(&db_pool, &u, "new", at(2)).await.unwrap();
        edit_post(&db_pool, &u, old.id, "old, edited").await.unwrap();

        let page = list_posts_by_user(&db_pool, &u, PageRequest::new(1, 5)).await.unwrap();
        assert_eq!(bodies(&page), ["new", "old, edited"]);
    }

    #[tokio::test]
    async fn followed_feed_includes_own_and_followed_authors() {
        let db_pool = pool().await;
        let reader = user(&db_pool, "reader").await;
        let friend = user(&db_pool, "friend").await;
        let stranger = user(&db_pool, "stranger").await;
        follows::follow(&db_pool, &reader, friend.id, at(0)).await.unwrap();

        create_post(&db_pool, &reader, "mine", at(1)).await.unwrap();
        create_post(&db_pool, &friend, "friend's", at(2)).await.unwrap();
        create_post(&db_pool, &stranger, "stranger's", at(3)).await.unwrap();

        let feed = list_posts_followed(&db_pool, &reader, PageRequest::new(1, 5)).await.unwrap();
        assert_eq!(bodies(&feed), ["friend's", "mine"]);
        assert_eq!(feed.total, 2);
    }
}
