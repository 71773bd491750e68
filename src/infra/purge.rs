//! Outbound purge backends for the revalidation endpoint.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::debug;
use url::Url;

use crate::application::revalidation::{CachePurger, PurgeError};
use crate::config::{PurgeBackend, RevalidationSettings};

use super::error::InfraError;

/// Posts `{"paths": [path]}` to a site rebuild hook.
pub struct BuildHookPurger {
    client: Client,
    hook_url: Url,
}

impl BuildHookPurger {
    pub fn new(client: Client, hook_url: Url) -> Self {
        Self { client, hook_url }
    }
}

#[async_trait]
impl CachePurger for BuildHookPurger {
    fn backend(&self) -> &'static str {
        "build_hook"
    }

    async fn purge(&self, path: &str) -> Result<(), PurgeError> {
        debug!(target = "uidir::purge", backend = self.backend(), path, "purging");
        let response = self
            .client
            .post(self.hook_url.clone())
            .json(&json!({ "paths": [path] }))
            .send()
            .await
            .map_err(|err| PurgeError::Request(err.to_string()))?;
        check_status(response.status())
    }
}

/// Calls the hosting platform's purge API with a bearer token.
pub struct PurgeApiPurger {
    client: Client,
    endpoint: Url,
    api_token: String,
    site_id: String,
}

impl PurgeApiPurger {
    pub const PURGE_PATH: &'static str = "api/v1/purge";

    pub fn new(
        client: Client,
        api_base: &Url,
        api_token: String,
        site_id: String,
    ) -> Result<Self, InfraError> {
        let mut base = api_base.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let endpoint = base
            .join(Self::PURGE_PATH)
            .map_err(|err| InfraError::configuration(format!("invalid purge api base: {err}")))?;
        Ok(Self {
            client,
            endpoint,
            api_token,
            site_id,
        })
    }
}

#[async_trait]
impl CachePurger for PurgeApiPurger {
    fn backend(&self) -> &'static str {
        "purge_api"
    }

    async fn purge(&self, path: &str) -> Result<(), PurgeError> {
        debug!(target = "uidir::purge", backend = self.backend(), path, "purging");
        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_token)
            .json(&json!({ "site_id": self.site_id, "paths": [path] }))
            .send()
            .await
            .map_err(|err| PurgeError::Request(err.to_string()))?;
        check_status(response.status())
    }
}

fn check_status(status: reqwest::StatusCode) -> Result<(), PurgeError> {
    if status.is_success() {
        Ok(())
    } else {
        Err(PurgeError::Status {
            status: status.as_u16(),
        })
    }
}

/// Build the configured purge backend, if the settings name a usable one.
///
/// `Auto` prefers the purge API when both its token and site id are present
/// and otherwise falls back to the build hook.
pub fn purger_from_settings(
    settings: &RevalidationSettings,
) -> Result<Option<Arc<dyn CachePurger>>, InfraError> {
    let client = Client::builder()
        .timeout(settings.timeout)
        .user_agent(settings.user_agent.as_str())
        .build()
        .map_err(|err| InfraError::http(format!("failed to build purge client: {err}")))?;

    let purge_api = match (&settings.api_token, &settings.site_id) {
        (Some(token), Some(site)) => Some((token.clone(), site.clone())),
        _ => None,
    };
    let use_purge_api = match settings.backend {
        PurgeBackend::PurgeApi => true,
        PurgeBackend::BuildHook => false,
        PurgeBackend::Auto => purge_api.is_some(),
    };

    let purger: Option<Arc<dyn CachePurger>> = if use_purge_api {
        match purge_api {
            Some((token, site)) => {
                let purger = PurgeApiPurger::new(client, &settings.api_base, token, site)?;
                Some(Arc::new(purger) as Arc<dyn CachePurger>)
            }
            None => None,
        }
    } else {
        settings
            .build_hook_url
            .clone()
            .map(|url| Arc::new(BuildHookPurger::new(client, url)) as Arc<dyn CachePurger>)
    };
    Ok(purger)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn purge_api_endpoint_is_joined_under_base() {
        let base = Url::parse("https://api.example.test/platform").expect("url");
        let purger =
            PurgeApiPurger::new(Client::new(), &base, "t".into(), "site".into()).expect("purger");
        assert_eq!(
            purger.endpoint.as_str(),
            "https://api.example.test/platform/api/v1/purge"
        );
    }

    #[test]
    fn non_success_status_is_an_error() {
        assert!(check_status(reqwest::StatusCode::NO_CONTENT).is_ok());
        assert!(matches!(
            check_status(reqwest::StatusCode::BAD_GATEWAY),
            Err(PurgeError::Status { status: 502 })
        ));
    }
}
