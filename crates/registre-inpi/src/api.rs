//! INPI endpoints: attachments listing, acte download, credential probe

use std::sync::Arc;

use registre_core::{
    AuthClient, AuthScheme, Call, CallError, Document, LoginConfig, RateLimiter, Sleep,
    TokenStore, Transport,
};
use serde_json::Value;

use crate::config::Config;

/// Build the bearer client with the INPI limits and backoff.
pub fn build_client<T: Transport>(
    config: &Config,
    transport: T,
    sleeper: Arc<dyn Sleep>,
) -> AuthClient<T> {
    let scheme = AuthScheme::Bearer {
        login: LoginConfig {
            url: config.login_url(),
            username: config.username.clone(),
            password: config.password.clone(),
        },
        store: TokenStore::new(&config.token_file),
    };
    AuthClient::new(transport, &config.base_url, scheme)
        .with_policy(config.retry.clone())
        .with_limiters(
            RateLimiter::per_minute(config.metadata_rpm),
            RateLimiter::per_minute(config.download_rpm),
        )
        .with_timeouts(config.metadata_timeout, config.download_timeout)
        .with_sleeper(sleeper)
}

pub fn attachments_call(siren: &str) -> Call {
    Call::get(format!("/api/companies/{siren}/attachments"))
}

/// Acte descriptors from an attachments payload (`actes` array)
pub fn parse_actes(body: &Value) -> Vec<Document> {
    body.get("actes")
        .and_then(Value::as_array)
        .map(|actes| {
            actes
                .iter()
                .map(|a| Document::from_json(a, &["id"], "nomDocument", "typeRdd", "typeActe"))
                .filter(|d| !d.id.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// List the actes filed for one company
pub fn fetch_actes<T: Transport>(
    client: &mut AuthClient<T>,
    siren: &str,
) -> Result<Vec<Document>, CallError> {
    let body = client.get_json(&attachments_call(siren))?;
    Ok(parse_actes(&body))
}

/// Raw PDF bytes of one acte
pub fn download_acte<T: Transport>(
    client: &mut AuthClient<T>,
    acte_id: &str,
) -> Result<Vec<u8>, CallError> {
    let response = client.call(&Call::download(format!("/api/actes/{acte_id}/download")))?;
    Ok(response.body)
}

/// Check the credential against a known identifier before the batch.
///
/// A 401 already triggers one re-login inside the call. Quota and login
/// failures are returned as-is; any other failure clears the stored token
/// and tries one clean login.
pub fn probe<T: Transport>(client: &mut AuthClient<T>, siren: &str) -> Result<(), CallError> {
    match client.call(&attachments_call(siren)) {
        Ok(_) => {
            log::info!("Token probe OK");
            Ok(())
        }
        Err(e) if e.is_run_terminating() => Err(e),
        Err(e) => {
            log::warn!("Token probe failed ({e}), trying a fresh login");
            client.invalidate()?;
            match client.login()? {
                Some(_) => Ok(()),
                None => Err(CallError::LoginFailed),
            }
        }
    }
}
