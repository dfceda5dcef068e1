mod page;
mod store;

use axum::{routing::{get, put}, Router};

use crate::AppState;

pub(crate) use page::{USERNAME_PATTERN, user_or_404};
pub use store::{
    AdminChanges, NewUser, ProfileChanges, User, UserProfile, UserSummary, edit_profile,
    edit_profile_admin, find_by_external_id, find_by_id, find_by_username, ping, profile,
    register_user, sanitize_username, unique_username,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users/{username}", get(page::user_page))
        .route("/profile", put(page::edit_profile))
        .route("/admin/users/{id}", put(page::edit_profile_admin))
}
