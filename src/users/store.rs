use serde::Serialize;
use sqlx::SqlitePool;
use time::OffsetDateTime;
use uuid::Uuid;
use validator::ValidateEmail;

use crate::{
    db::{count_to_u64, from_micros, parse_uuid, to_micros},
    error::{CoreError, CoreResult, is_unique_violation},
    permissions::{Permissions, Role, permission_required},
};

const USER_COLUMNS: &str =
    "id,external_id,username,email,role,confirmed,name,location,about_me,member_since,last_seen";
const MAX_FIELD_CHARS: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub external_id: Option<String>,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub confirmed: bool,
    pub name: String,
    pub location: String,
    pub about_me: String,
    pub member_since: OffsetDateTime,
    pub last_seen: OffsetDateTime,
}

impl User {
    pub fn can(&self, needed: Permissions) -> bool {
        self.role.permissions().contains(needed)
    }

    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            username: self.username.clone(),
            name: self.name.clone(),
        }
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: String,
    external_id: Option<String>,
    username: String,
    email: String,
    role: String,
    confirmed: bool,
    name: String,
    location: String,
    about_me: String,
    member_since: i64,
    last_seen: i64,
}

impl TryFrom<UserRow> for User {
    type Error = CoreError;

    fn try_from(row: UserRow) -> CoreResult<Self> {
        Ok(User {
            id: parse_uuid(&row.id)?,
            external_id: row.external_id,
            username: row.username,
            email: row.email,
            role: row.role.parse()?,
            confirmed: row.confirmed,
            name: row.name,
            location: row.location,
            about_me: row.about_me,
            member_since: from_micros(row.member_since)?,
            last_seen: from_micros(row.last_seen)?,
        })
    }
}

/// What the rendering layer sees of another user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub username: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    #[serde(flatten)]
    pub summary: UserSummary,
    pub location: String,
    pub about_me: String,
    pub role: Role,
    pub confirmed: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub member_since: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub last_seen: OffsetDateTime,
    pub followers: u64,
    pub followed: u64,
    pub posts: u64,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub external_id: Option<String>,
    pub username: String,
    pub email: String,
    pub name: String,
}

/// Fields a user may change on their own profile.
#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub name: String,
    pub location: String,
    pub about_me: String,
}

/// Fields an administrator may change on any profile. `None` keeps the value.
#[derive(Debug, Clone, Default)]
pub struct AdminChanges {
    pub email: Option<String>,
    pub username: Option<String>,
    pub confirmed: Option<bool>,
    pub role: Option<Role>,
    pub name: Option<String>,
    pub location: Option<String>,
    pub about_me: Option<String>,
}

pub async fn find_by_id(db_pool: &SqlitePool, id: Uuid) -> CoreResult<Option<User>> {
    let row: Option<UserRow> = sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id=?"))
        .bind(id.to_string())
        .fetch_optional(db_pool)
        .await?;
    row.map(User::try_from).transpose()
}

pub async fn find_by_username(db_pool: &SqlitePool, username: &str) -> CoreResult<Option<User>> {
    let row: Option<UserRow> = sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE username=?"))
        .bind(username)
        .fetch_optional(db_pool)
        .await?;
    row.map(User::try_from).transpose()
}

pub async fn find_by_external_id(db_pool: &SqlitePool, external_id: &str) -> CoreResult<Option<User>> {
    let row: Option<UserRow> = sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE external_id=?"))
        .bind(external_id)
        .fetch_optional(db_pool)
        .await?;
    row.map(User::try_from).transpose()
}

async fn username_taken(db_pool: &SqlitePool, username: &str, except: Option<Uuid>) -> CoreResult<bool> {
    let found: Option<(String,)> = sqlx::query_as("SELECT id FROM users WHERE username=?")
        .bind(username)
        .fetch_optional(db_pool)
        .await?;
    Ok(found.is_some_and(|(id,)| Some(id) != except.map(|e| e.to_string())))
}

async fn email_taken(db_pool: &SqlitePool, email: &str, except: Option<Uuid>) -> CoreResult<bool> {
    let found: Option<(String,)> = sqlx::query_as("SELECT id FROM users WHERE email=? COLLATE NOCASE")
        .bind(email)
        .fetch_optional(db_pool)
        .await?;
    Ok(found.is_some_and(|(id,)| Some(id) != except.map(|e| e.to_string())))
}

/// Turn a constraint violation on `users` into the matching typed error.
fn uniqueness_error(err: sqlx::Error, username: &str, email: &str) -> CoreError {
    if !is_unique_violation(&err) {
        return err.into();
    }
    let message = err
        .as_database_error()
        .map(|db_err| db_err.message().to_owned())
        .unwrap_or_default();
    if message.contains("users.email") {
        CoreError::EmailTaken(email.to_owned())
    } else if message.contains("users.username") {
        CoreError::UsernameTaken(username.to_owned())
    } else {
        err.into()
    }
}

fn check_email(email: &str) -> CoreResult<()> {
    if !email.validate_email() || email.chars().count() > MAX_FIELD_CHARS {
        return Err(CoreError::Invalid {
            field: "email",
            reason: format!("`{email}` is not a valid address"),
        });
    }
    Ok(())
}

fn check_length(field: &'static str, value: &str) -> CoreResult<()> {
    let chars = value.chars().count();
    if chars > MAX_FIELD_CHARS {
        return Err(CoreError::Invalid {
            field,
            reason: format!("at most {MAX_FIELD_CHARS} characters, got {chars}"),
        });
    }
    Ok(())
}

/// Strip a login or e-mail local part down to a valid username.
pub fn sanitize_username(candidate: &str) -> Option<String> {
    let cleaned: String = candidate
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '.')
        .skip_while(|c| !c.is_ascii_alphabetic())
        .take(MAX_FIELD_CHARS)
        .collect();
    (!cleaned.is_empty()).then_some(cleaned)
}

/// First free username derived from `candidate`.
pub async fn unique_username(db_pool: &SqlitePool, candidate: &str) -> CoreResult<String> {
    if let Some(base) = sanitize_username(candidate) {
        if !username_taken(db_pool, &base, None).await? {
            return Ok(base);
        }
        for suffix in 2..10 {
            let name = format!("{}{suffix}", base.chars().take(MAX_FIELD_CHARS - 1).collect::<String>());
            if !username_taken(db_pool, &name, None).await? {
                return Ok(name);
            }
        }
    }
    Ok(format!("user{}", Uuid::now_v7().simple()))
}

#[tracing::instrument(skip(db_pool, new_user), fields(username = %new_user.username))]
pub async fn register_user(
    db_pool: &SqlitePool,
    new_user: NewUser,
    admin_email: Option<&str>,
    now: OffsetDateTime,
) -> CoreResult<User> {
    let NewUser { external_id, username, email, name } = new_user;
    if sanitize_username(&username).as_deref() != Some(username.as_str()) {
        return Err(CoreError::Invalid {
            field: "username",
            reason: "letters, numbers, dots or underscores, starting with a letter".to_owned(),
        });
    }
    check_email(&email)?;
    check_length("name", &name)?;
    if username_taken(db_pool, &username, None).await? {
        return Err(CoreError::UsernameTaken(username));
    }
    if email_taken(db_pool, &email, None).await? {
        return Err(CoreError::EmailTaken(email));
    }

    let role = match admin_email {
        Some(admin) if admin.eq_ignore_ascii_case(&email) => Role::Administrator,
        _ => Role::default(),
    };

    let id = Uuid::now_v7();
    sqlx::query(
        "INSERT INTO users (id,external_id,username,email,role,confirmed,name,member_since,last_seen) \
         VALUES (?,?,?,?,?,0,?,?,?)",
    )
    .bind(id.to_string())
    .bind(&external_id)
    .bind(&username)
    .bind(&email)
    .bind(role.as_str())
    .bind(&name)
    .bind(to_micros(now))
    .bind(to_micros(now))
    .execute(db_pool)
    .await
    .map_err(|err| uniqueness_error(err, &username, &email))?;

    tracing::info!(%id, %role, "registered user @{username}");
    Ok(User {
        id,
        external_id,
        username,
        email,
        role,
        confirmed: false,
        name,
        location: String::new(),
        about_me: String::new(),
        member_since: now,
        last_seen: now,
    })
}

pub async fn edit_profile(
    db_pool: &SqlitePool,
    actor: &User,
    changes: ProfileChanges,
) -> CoreResult<User> {
    check_length("name", &changes.name)?;
    check_length("location", &changes.location)?;

    sqlx::query("UPDATE users SET name=?,location=?,about_me=? WHERE id=?")
        .bind(&changes.name)
        .bind(&changes.location)
        .bind(&changes.about_me)
        .bind(actor.id.to_string())
        .execute(db_pool)
        .await?;

    tracing::info!(user = %actor.username, "profile updated");
    Ok(User {
        name: changes.name,
        location: changes.location,
        about_me: changes.about_me,
        ..actor.clone()
    })
}

#[tracing::instrument(skip(db_pool, admin, changes), fields(admin = %admin.username))]
pub async fn edit_profile_admin(
    db_pool: &SqlitePool,
    admin: &User,
    user_id: Uuid,
    changes: AdminChanges,
) -> CoreResult<User> {
    permission_required(admin, Permissions::ADMIN)?;
    let Some(mut user) = find_by_id(db_pool, user_id).await? else {
        return Err(CoreError::NotFound("user"));
    };

    if let Some(username) = changes.username {
        if sanitize_username(&username).as_deref() != Some(username.as_str()) {
            return Err(CoreError::Invalid {
                field: "username",
                reason: "letters, numbers, dots or underscores, starting with a letter".to_owned(),
            });
        }
        if username_taken(db_pool, &username, Some(user_id)).await? {
            return Err(CoreError::UsernameTaken(username));
        }
        user.username = username;
    }
    if let Some(email) = changes.email {
        check_email(&email)?;
        if email_taken(db_pool, &email, Some(user_id)).await? {
            return Err(CoreError::EmailTaken(email));
        }
        user.email = email;
    }
    if let Some(name) = changes.name {
        check_length("name", &name)?;
        user.name = name;
    }
    if let Some(location) = changes.location {
        check_length("location", &location)?;
        user.location = location;
    }
    user.about_me = changes.about_me.unwrap_or(user.about_me);
    user.confirmed = changes.confirmed.unwrap_or(user.confirmed);
    user.role = changes.role.unwrap_or(user.role);

    sqlx::query(
        "UPDATE users SET username=?,email=?,confirmed=?,role=?,name=?,location=?,about_me=? WHERE id=?",
    )
    .bind(&user.username)
    .bind(&user.email)
    .bind(user.confirmed)
    .bind(user.role.as_str())
    .bind(&user.name)
    .bind(&user.location)
    .bind(&user.about_me)
    .bind(user_id.to_string())
    .execute(db_pool)
    .await
    .map_err(|err| uniqueness_error(err, &user.username, &user.email))?;

    tracing::info!(user = %user.username, role = %user.role, "profile updated by admin");
    Ok(user)
}

/// Record activity of a signed-in user.
pub async fn ping(db_pool: &SqlitePool, user: &mut User, now: OffsetDateTime) -> CoreResult<()> {
    sqlx::query("UPDATE users SET last_seen=? WHERE id=?")
        .bind(to_micros(now))
        .bind(user.id.to_string())
        .execute(db_pool)
        .await?;
    user.last_seen = now;
    Ok(())
}

pub async fn profile(db_pool: &SqlitePool, user: &User) -> CoreResult<UserProfile> {
    let id = user.id.to_string();
    let (followers, followed, posts): (i64, i64, i64) = sqlx::query_as(
        "SELECT \
            (SELECT COUNT(*) FROM follows WHERE followed_id=?1), \
            (SELECT COUNT(*) FROM follows WHERE follower_id=?1), \
            (SELECT COUNT(*) FROM posts WHERE author_id=?1)",
    )
    .bind(&id)
    .fetch_one(db_pool)
    .await?;

    Ok(UserProfile {
        summary: user.summary(),
        location: user.location.clone(),
        about_me: user.about_me.clone(),
        role: user.role,
        confirmed: user.confirmed,
        member_since: user.member_since,
        last_seen: user.last_seen,
        followers: count_to_u64(followers),
        followed: count_to_u64(followed),
        posts: count_to_u64(posts),
    })
}
