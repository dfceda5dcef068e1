mod graph;
mod handlers;

use axum::{routing::{get, post}, Router};

use crate::AppState;

pub use graph::{FollowEdge, follow, is_following, list_followed, list_followers, unfollow};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/follow/{username}", post(handlers::follow))
        .route("/unfollow/{username}", post(handlers::unfollow))
        .route("/users/{username}/following", get(handlers::following))
        .route("/users/{username}/followers", get(handlers::followers))
        .route("/users/{username}/followed", get(handlers::followed))
}
