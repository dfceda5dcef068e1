//! Sign-in through OAuth providers. The first successful sign-in registers the account.

use axum::{routing::get, Router};
use rand::seq::IndexedRandom;

use crate::AppState;

mod clients;
mod login;
mod lockin;
mod logout;

pub use clients::{ClientProvider, Clients, ProviderIdentity};
pub use login::login;
pub use lockin::lockin;
pub use logout::logout;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login/{provider}", get(login))
        .route("/lockin/{provider}", get(lockin))
        .route("/logout", get(logout))
}

/// Display name for accounts whose provider shares none.
pub(crate) fn random_alias() -> String {
    let adjectives = [
        "Quiet", "Curious", "Patient", "Jolly", "Brave", "Silent", "Witty", "Gentle",
        "Clever", "Humble", "Calm", "Bold", "Bright", "Eager", "Golden", "Lucky",
    ];
    let nouns = [
        "Scribe", "Reader", "Poet", "Owl", "Sparrow", "Heron", "Lotus", "Banyan",
        "Peacock", "Tiger", "River", "Comet", "Lantern", "Falcon", "Panda", "Otter",
    ];

    let mut rng = rand::rng();
    match (adjectives.choose(&mut rng), nouns.choose(&mut rng)) {
        (Some(adjective), Some(noun)) => format!("{adjective} {noun}"),
        _ => "Anonymous Reader".to_owned(),
    }
}

/// Only same-site paths are followed after sign-in or sign-out.
pub(crate) fn local_path(return_url: Option<String>) -> String {
    return_url
        .filter(|url| url.starts_with('/') && !url.starts_with("//") && !url.contains('\\'))
        .unwrap_or_else(|| "/posts".to_owned())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(None, "/posts")]
    #[case(Some("/users/ann"), "/users/ann")]
    #[case(Some("https://evil.example/"), "/posts")]
    #[case(Some("//evil.example/"), "/posts")]
    #[case(Some("/\\evil.example"), "/posts")]
    fn return_urls_stay_local(#[case] given: Option<&str>, #[case] expected: &str) {
        assert_eq!(local_path(given.map(str::to_owned)), expected);
    }

    #[test]
    fn alias_has_two_words() {
        assert_eq!(random_alias().split(' ').count(), 2);
    }
}
