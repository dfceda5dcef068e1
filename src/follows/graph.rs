//! The directed follow graph, kept as a flat edge table keyed by
//! `(follower_id, followed_id)`.
//!
//! Both directions are views over the same table: followers filter on the
//! second component, followed users on the first.

use serde::Serialize;
use sqlx::SqlitePool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    db::{count_to_u64, from_micros, parse_uuid, to_micros},
    error::{CoreError, CoreResult, is_check_violation, is_unique_violation},
    pagination::{Page, PageRequest},
    permissions::{Permissions, permission_required},
    users::{self, User, UserSummary},
};

/// One end of an edge together with the time it was created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FollowEdge {
    pub user: UserSummary,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

#[derive(Clone, Copy)]
enum Direction {
    /// Edges pointing at the user.
    Followers,
    /// Edges leaving the user.
    Followed,
}

impl Direction {
    const fn columns(self) -> (&'static str, &'static str) {
        match self {
            Direction::Followers => ("followed_id", "follower_id"),
            Direction::Followed => ("follower_id", "followed_id"),
        }
    }
}

#[tracing::instrument(skip(db_pool, actor), fields(actor = %actor.username))]
pub async fn follow(
    db_pool: &SqlitePool,
    actor: &User,
    target: Uuid,
    now: OffsetDateTime,
) -> CoreResult<()> {
    if actor.id == target {
        tracing::warn!("self-follow rejected");
        return Err(CoreError::InvalidTarget("cannot follow yourself"));
    }
    permission_required(actor, Permissions::FOLLOW)?;
    if users::find_by_id(db_pool, target).await?.is_none() {
        return Err(CoreError::InvalidTarget("no such user"));
    }

    let inserted = sqlx::query("INSERT INTO follows (follower_id,followed_id,created_at) VALUES (?,?,?)")
        .bind(actor.id.to_string())
        .bind(target.to_string())
        .bind(to_micros(now))
        .execute(db_pool)
        .await;

    match inserted {
        Ok(_) => {
            tracing::info!("now following");
            Ok(())
        }
        Err(err) if is_unique_violation(&err) => Err(CoreError::AlreadyFollowing),
        Err(err) if is_check_violation(&err) => Err(CoreError::InvalidTarget("cannot follow yourself")),
        Err(err) => Err(err.into()),
    }
}

#[tracing::instrument(skip(db_pool, actor), fields(actor = %actor.username))]
pub async fn unfollow(db_pool: &SqlitePool, actor: &User, target: Uuid) -> CoreResult<()> {
    permission_required(actor, Permissions::FOLLOW)?;

    let deleted = sqlx::query("DELETE FROM follows WHERE follower_id=? AND followed_id=?")
        .bind(actor.id.to_string())
        .bind(target.to_string())
        .execute(db_pool)
        .await?;

    if deleted.rows_affected() == 0 {
        return Err(CoreError::NotFollowing);
    }
    tracing::info!("unfollowed");
    Ok(())
}

/// Membership test; an unknown user simply isn't followed.
///
/// Only a storage failure is returned as an error.
pub async fn is_following(db_pool: &SqlitePool, actor: Uuid, target: Uuid) -> CoreResult<bool> {
    let found = sqlx::query("SELECT 1 FROM follows WHERE follower_id=? AND followed_id=?")
        .bind(actor.to_string())
        .bind(target.to_string())
        .fetch_optional(db_pool)
        .await?;
    Ok(found.is_some())
}

/// Users following `target`, oldest edge first.
pub async fn list_followers(
    db_pool: &SqlitePool,
    target: &User,
    request: PageRequest,
) -> CoreResult<Page<FollowEdge>> {
    list_edges(db_pool, target.id, Direction::Followers, request).await
}

/// Users `actor` follows, oldest edge first.
pub async fn list_followed(
    db_pool: &SqlitePool,
    actor: &User,
    request: PageRequest,
) -> CoreResult<Page<FollowEdge>> {
    list_edges(db_pool, actor.id, Direction::Followed, request).await
}

async fn list_edges(
    db_pool: &SqlitePool,
    user_id: Uuid,
    direction: Direction,
    request: PageRequest,
) -> CoreResult<Page<FollowEdge>> {
    let (anchor, other) = direction.columns();
    let mut tx = db_pool.begin().await?;

    let (total,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM follows WHERE {anchor}=?"))
        .bind(user_id.to_string())
        .fetch_one(&mut *tx)
        .await?;

    let rows: Vec<(String, String, String, i64)> = sqlx::query_as(&format!(
        "SELECT u.id,u.username,u.name,f.created_at FROM follows f \
         JOIN users u ON u.id=f.{other} \
         WHERE f.{anchor}=? \
         ORDER BY f.created_at ASC, f.rowid ASC \
         LIMIT ? OFFSET ?"
    ))
    .bind(user_id.to_string())
    .bind(i64::try_from(request.limit()).unwrap_or(i64::MAX))
    .bind(i64::try_from(request.offset()).unwrap_or(i64::MAX))
    .fetch_all(&mut *tx)
    .await?;
    tx.commit().await?;

    let items = rows
        .into_iter()
        .map(|(id, username, name, created_at)| {
            Ok(FollowEdge {
                user: UserSummary { id: parse_uuid(&id)?, username, name },
                timestamp: from_micros(created_at)?,
            })
        })
        .collect::<CoreResult<Vec<_>>>()?;

    tracing::debug!(%user_id, page = request.page(), count = items.len(), "listed follow edges");
    Ok(Page::from_parts(items, request, count_to_u64(total)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::test_support::{at, pool, user, user_with_role},
        permissions::Role,
    };

    #[tokio::test]
    async fn follow_then_listed_once() {
        let db_pool = pool().await;
        let a = user(&db_pool, "alice").await;
        let b = user(&db_pool, "bob").await;

        follow(&db_pool, &a, b.id, at(10)).await.unwrap();

        assert!(is_following(&db_pool, a.id, b.id).await.unwrap());
        assert!(!is_following(&db_pool, b.id, a.id).await.unwrap());

        let followers = list_followers(&db_pool, &b, PageRequest::new(1, 50)).await.unwrap();
        assert_eq!(followers.total, 1);
        assert_eq!(followers.items.len(), 1);
        assert_eq!(followers.items[0].user, a.summary());
        assert_eq!(followers.items[0].timestamp, at(10));

        let followed = list_followed(&db_pool, &a, PageRequest::new(1, 50)).await.unwrap();
        assert_eq!(followed.items[0].user, b.summary());
    }

    #[tokio::test]
    async fn self_follow_is_invalid_for_any_role() {
        let db_pool = pool().await;
        for (name, role) in [("a", Role::User), ("s", Role::Suspended), ("r", Role::Administrator)] {
            let actor = user_with_role(&db_pool, name, role).await;
            let err = follow(&db_pool, &actor, actor.id, at(1)).await.unwrap_err();
            assert!(matches!(err, CoreError::InvalidTarget(_)), "{role}: {err}");
            assert!(!is_following(&db_pool, actor.id, actor.id).await.unwrap());
        }
    }

    #[tokio::test]
    async fn duplicate_follow_leaves_state_unchanged() {
        let db_pool = pool().await;
        let a = user(&db_pool, "alice").await;
        let b = user(&db_pool, "bob").await;

        follow(&db_pool, &a, b.id, at(1)).await.unwrap();
        let err = follow(&db_pool, &a, b.id, at(2)).await.unwrap_err();
        assert!(matches!(err, CoreError::AlreadyFollowing));

        let followers = list_followers(&db_pool, &b, PageRequest::new(1, 50)).await.unwrap();
        assert_eq!(followers.total, 1);
        assert_eq!(followers.items[0].timestamp, at(1));
    }

    #[tokio::test]
    async fn unfollow_without_edge() {
        let db_pool = pool().await;
        let a = user(&db_pool, "alice").await;
        let b = user(&db_pool, "bob").await;

        let err = unfollow(&db_pool, &a, b.id).await.unwrap_err();
        assert!(matches!(err, CoreError::NotFollowing));

        follow(&db_pool, &a, b.id, at(1)).await.unwrap();
        unfollow(&db_pool, &a, b.id).await.unwrap();
        assert!(!is_following(&db_pool, a.id, b.id).await.unwrap());
        assert!(matches!(unfollow(&db_pool, &a, b.id).await, Err(CoreError::NotFollowing)));
    }

    #[tokio::test]
    async fn unknown_target() {
        let db_pool = pool().await;
        let a = user(&db_pool, "alice").await;
        let ghost = Uuid::now_v7();

        let err = follow(&db_pool, &a, ghost, at(1)).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidTarget(_)));
        assert!(!is_following(&db_pool, a.id, ghost).await.unwrap());
    }

    #[tokio::test]
    async fn suspended_users_cannot_follow_or_unfollow() {
        let db_pool = pool().await;
        let a = user_with_role(&db_pool, "alice", Role::Suspended).await;
        let b = user(&db_pool, "bob").await;

        let err = follow(&db_pool, &a, b.id, at(1)).await.unwrap_err();
        assert!(matches!(err, CoreError::Unauthorized { needed } if needed == Permissions::FOLLOW));
        let err = unfollow(&db_pool, &a, b.id).await.unwrap_err();
        assert!(matches!(err, CoreError::Unauthorized { .. }));
    }

    #[tokio::test]
    async fn followers_ordered_by_edge_time_then_insertion() {
        let db_pool = pool().await;
        let target = user(&db_pool, "target").await;
        let late = user(&db_pool, "late").await;
        let first = user(&db_pool, "first").await;
        let second = user(&db_pool, "second").await;

        follow(&db_pool, &late, target.id, at(20)).await.unwrap();
        follow(&db_pool, &first, target.id, at(10)).await.unwrap();
        follow(&db_pool, &second, target.id, at(10)).await.unwrap();

        let page = list_followers(&db_pool, &target, PageRequest::new(1, 2)).await.unwrap();
        let names: Vec<_> = page.items.iter().map(|e| e.user.username.as_str()).collect();
        assert_eq!(names, ["first", "second"]);
        assert!(page.has_next);
        assert!(!page.has_prev);

        let page = list_followers(&db_pool, &target, PageRequest::new(2, 2)).await.unwrap();
        let names: Vec<_> = page.items.iter().map(|e| e.user.username.as_str()).collect();
        assert_eq!(names, ["late"]);
        assert!(!page.has_next);
        assert!(page.has_prev);
        assert_eq!(page.total, 3);
    }

    #[tokio::test]
    async fn far_page_of_followers_is_empty() {
        let db_pool = pool().await;
        let a = user(&db_pool, "alice").await;
        let b = user(&db_pool, "bob").await;
        follow(&db_pool, &a, b.id, at(1)).await.unwrap();

        let page = list_followers(&db_pool, &b, PageRequest::new(999_999, 50)).await.unwrap();
        assert!(page.items.is_empty());
        assert!(!page.has_next);
        assert_eq!(page.total, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_follow_and_unfollow_keep_one_edge_at_most() {
        let path = std::env::temp_dir().join(format!("sanskrity-follows-{}.db", Uuid::now_v7().simple()));
        let db_pool = crate::db::connect(&format!("sqlite://{}", path.display())).await.unwrap();
        let a = user(&db_pool, "alice").await;
        let b = user(&db_pool, "bob").await;

        let tasks: Vec<_> = (0..32i64)
            .map(|i| {
                let (db_pool, a, target) = (db_pool.clone(), a.clone(), b.id);
                tokio::spawn(async move {
                    if i % 2 == 0 {
                        follow(&db_pool, &a, target, at(i)).await
                    } else {
                        unfollow(&db_pool, &a, target).await
                    }
                })
            })
            .collect();
        for task in tasks {
            match task.await.unwrap() {
                Ok(()) | Err(CoreError::AlreadyFollowing) | Err(CoreError::NotFollowing) => {}
                Err(other) => panic!("unexpected outcome: {other:?}"),
            }
        }

        let page = list_followers(&db_pool, &b, PageRequest::new(1, 50)).await.unwrap();
        assert!(page.total <= 1);
        assert_eq!(page.total == 1, is_following(&db_pool, a.id, b.id).await.unwrap());

        db_pool.close().await;
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{suffix}", path.display()));
        }
    }
}
