mod feed;
mod handlers;

use axum::{routing::{get, put}, Router};

use crate::AppState;

pub use feed::{
    Post, PostSummary, create_post, edit_post, find_post, list_posts_by_user, list_posts_followed,
    list_posts_global, render_markdown,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/posts", get(handlers::index).post(handlers::new_post))
        .route("/posts/followed", get(handlers::followed))
        .route("/posts/{id}", put(handlers::edit))
        .route("/users/{username}/posts", get(handlers::by_user))
}
