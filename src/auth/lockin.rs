use std::sync::Arc;

use anyhow::{anyhow, Context};
use axum::{debug_handler, extract::{Path, Query, State}, http::header::USER_AGENT, response::Redirect};
use oauth2::{AuthorizationCode, CsrfToken, PkceCodeVerifier, TokenResponse};
use serde::Deserialize;
use serde_json::Value;
use sqlx::SqlitePool;
use time::OffsetDateTime;
use tower_sessions::Session;

use crate::{
    config::Config,
    session::{CSRF_STATE, PKCE_VERIFIER, RETURN_URL, USER_ID},
    users::{self, NewUser, User},
    AppResult, AppState,
};

use super::{clients::{ClientProvider, ProviderIdentity}, Clients};

#[derive(Deserialize)]
pub struct LockinQuery {
    pub state: Option<String>,
    pub code: Option<String>,
}

#[debug_handler(state = AppState)]
pub async fn lockin(
    Path(provider): Path<ClientProvider>,
    Query(LockinQuery { state, code }): Query<LockinQuery>,
    State(db_pool): State<SqlitePool>,
    State(clients): State<Clients>,
    State(config): State<Arc<Config>>,
    session: Session,
) -> AppResult<Redirect> {
    let state = CsrfToken::new(state.context("OAuth: without state")?);
    let code = AuthorizationCode::new(code.context("OAuth: without code")?);

    let Some(stored_state) = session.remove::<String>(CSRF_STATE).await? else {
        return Err(anyhow!("no csrf_state"))?;
    };

    if state.secret().as_str() != stored_state.as_str() {
        return Err(anyhow!("csrf tokens don't match"))?;
    }

    let Some(pkce_verifier) = session.remove::<String>(PKCE_VERIFIER).await? else {
        return Err(anyhow!("no pkce_verifier"))?;
    };

    let client = clients.get_client(provider)?;
    let http_client = reqwest::ClientBuilder::new()
        .redirect(reqwest::redirect::Policy::none())
        .build()?;
    let token_result = client
        .exchange_code(code)
        .set_pkce_verifier(PkceCodeVerifier::new(pkce_verifier))
        .request_async(&http_client)
        .await?;

    let body: Value = http_client.get(provider.userinfo_url())
        .bearer_auth(token_result.access_token().secret())
        .header(USER_AGENT, "sanskrity")
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    let identity = provider.identity(&body)?;
    let user = match users::find_by_external_id(&db_pool, &identity.external_id).await? {
        Some(user) => user,
        None => register(&db_pool, &config, identity).await?,
    };

    session.cycle_id().await?;
    session.insert(USER_ID, user.id).await?;
    let return_url = session.remove::<String>(RETURN_URL).await?;

    tracing::info!(user_id = %user.id, %provider, "welcome @{}", user.username);
    Ok(Redirect::to(&super::local_path(return_url)))
}

async fn register(db_pool: &SqlitePool, config: &Config, identity: ProviderIdentity) -> AppResult<User> {
    let ProviderIdentity { external_id, login, email, name } = identity;
    let email = email.context("provider did not share an e-mail address")?;

    let candidate = login
        .or_else(|| email.split('@').next().map(str::to_owned))
        .unwrap_or_default();
    let username = users::unique_username(db_pool, &candidate).await?;
    let name = name
        .map(|name| name.chars().take(64).collect::<String>())
        .unwrap_or_else(super::random_alias);

    let new_user = NewUser { external_id: Some(external_id), username, email, name };
    Ok(users::register_user(db_pool, new_user, config.admin_email.as_deref(), OffsetDateTime::now_utc()).await?)
}
