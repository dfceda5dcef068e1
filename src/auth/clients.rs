use std::fmt;

use anyhow::anyhow;
use oauth2::{basic::BasicClient, AuthUrl, Client, ClientId, ClientSecret, RedirectUrl, Scope, TokenUrl};
use serde::Deserialize;
use serde_json::Value;

use crate::{config::{Config, OAuthKeys}, AppResult, GetField};

type ProviderClient = Client<oauth2::StandardErrorResponse<oauth2::basic::BasicErrorResponseType>, oauth2::StandardTokenResponse<oauth2::EmptyExtraTokenFields, oauth2::basic::BasicTokenType>, oauth2::StandardTokenIntrospectionResponse<oauth2::EmptyExtraTokenFields, oauth2::basic::BasicTokenType>, oauth2::StandardRevocableToken, oauth2::StandardErrorResponse<oauth2::RevocationErrorResponseType>, oauth2::EndpointSet, oauth2::EndpointNotSet, oauth2::EndpointNotSet, oauth2::EndpointNotSet, oauth2::EndpointSet>;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ClientProvider {
    Google,
    Github,
}

/// Who the provider says signed in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderIdentity {
    pub external_id: String,
    pub login: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
}

impl ClientProvider {
    pub fn id(&self) -> &str {
        use ClientProvider::*;
        match self {
            Google => "google.com",
            Github => "github.com",
        }
    }

    fn endpoints(&self) -> (&'static str, &'static str) {
        use ClientProvider::*;
        match self {
            Google => ("https://accounts.google.com/o/oauth2/auth", "https://oauth2.googleapis.com/token"),
            Github => ("https://github.com/login/oauth/authorize", "https://github.com/login/oauth/access_token"),
        }
    }

    pub fn scopes(&self) -> Vec<Scope> {
        use ClientProvider::*;
        let scopes: &[&str] = match self {
            Google => &["openid", "email", "profile"],
            Github => &["read:user", "user:email"],
        };
        scopes.iter().map(|scope| Scope::new((*scope).to_owned())).collect()
    }

    pub fn userinfo_url(&self) -> &'static str {
        use ClientProvider::*;
        match self {
            Google => "https://www.googleapis.com/oauth2/v2/userinfo",
            Github => "https://api.github.com/user",
        }
    }

    /// Read the provider's user-info document.
    pub fn identity(&self, body: &Value) -> AppResult<ProviderIdentity> {
        let id = match body.get_obj_field("id")? {
            Value::String(id) => id.clone(),
            Value::Number(id) => id.to_string(),
            other => return Err(anyhow!("unexpected id {other} from {self}"))?,
        };
        let login = match self {
            ClientProvider::Github => Some(body.get_str_field("login")?),
            ClientProvider::Google => None,
        };
        let email = body.get_opt_str_field("email").or_else(|| {
            // github hides private addresses
            login.as_ref().filter(|_| *self == ClientProvider::Github)
                .map(|login| format!("{login}@users.noreply.github.com"))
        });

        Ok(ProviderIdentity {
            external_id: format!("{}:{id}", self.id()),
            login,
            email,
            name: body.get_opt_str_field("name").filter(|name| !name.trim().is_empty()),
        })
    }
}

impl fmt::Display for ClientProvider {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Clone)]
pub struct Clients {
    google_client: Option<ProviderClient>,
    github_client: Option<ProviderClient>,
}

impl Clients {
    pub fn from_config(config: &Config) -> AppResult<Clients> {
        let build = |provider: ClientProvider, keys: &Option<OAuthKeys>| -> AppResult<Option<ProviderClient>> {
            let Some(keys) = keys else {
                return Ok(None);
            };
            let (auth_url, token_url) = provider.endpoints();
            let redirect_url = format!("{}/lockin/{}", config.public_url.trim_end_matches('/'), provider.to_string().to_lowercase());

            Ok(Some(
                BasicClient::new(ClientId::new(keys.client_id.clone()))
                .set_client_secret(ClientSecret::new(keys.client_secret.clone()))
                .set_auth_uri(AuthUrl::new(auth_url.to_owned())?)
                .set_token_uri(TokenUrl::new(token_url.to_owned())?)
                .set_redirect_uri(RedirectUrl::new(redirect_url)?)
            ))
        };

        Ok(
            Clients {
                google_client: build(ClientProvider::Google, &config.google)?,
                github_client: build(ClientProvider::Github, &config.github)?,
            }
        )
    }

    pub fn get_client(&self, provider: ClientProvider) -> AppResult<ProviderClient> {
        use ClientProvider::*;
        match provider {
            Google => self.google_client.clone(),
            Github => self.github_client.clone(),
        }.ok_or_else(|| anyhow!("OAuth provider {provider} keys not supplied").into())
    }
}
