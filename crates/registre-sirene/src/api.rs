//! Diffusible-existence check against the SIRENE search endpoint

use std::collections::BTreeSet;
use std::sync::Arc;

use registre_core::{
    AuthClient, AuthScheme, Call, CallError, RateLimiter, Sleep, Transport,
};
use serde_json::Value;

use crate::config::{API_KEY_HEADER, Config};

pub fn build_client<T: Transport>(
    config: &Config,
    transport: T,
    sleeper: Arc<dyn Sleep>,
) -> AuthClient<T> {
    let scheme = AuthScheme::ApiKey {
        header: API_KEY_HEADER.to_string(),
        key: config.api_key.clone(),
    };
    AuthClient::new(transport, &config.search_url, scheme)
        .with_policy(config.retry.clone())
        .with_limiters(RateLimiter::unlimited(), RateLimiter::unlimited())
        .with_timeouts(config.request_timeout, config.request_timeout)
        .with_sleeper(sleeper)
}

/// `(siren:A OR siren:B ...)`
pub fn search_query(chunk: &[String]) -> String {
    let terms: Vec<String> = chunk.iter().map(|s| format!("siren:{s}")).collect();
    format!("({})", terms.join(" OR "))
}

/// SIRENs of the chunk returned by the search, i.e. existing and diffusible.
///
/// Non-diffusible units never appear. Any HTTP failure soft-fails to an
/// empty set; only a local I/O failure is returned.
pub fn batch_diffusible_exists<T: Transport>(
    client: &mut AuthClient<T>,
    search_url: &str,
    chunk: &[String],
) -> Result<BTreeSet<String>, CallError> {
    if chunk.is_empty() {
        return Ok(BTreeSet::new());
    }
    let call = Call::get(search_url)
        .query("q", search_query(chunk))
        .query("champs", "siren")
        .query("nombre", chunk.len());
    let body = match client.get_json(&call) {
        Ok(body) => body,
        Err(e @ CallError::Io(_)) => return Err(e),
        Err(e) => {
            log::warn!("Search batch of {} failed ({e}), counting none", chunk.len());
            return Ok(BTreeSet::new());
        }
    };
    let found = body
        .get("unitesLegales")
        .and_then(Value::as_array)
        .map(|units| {
            units
                .iter()
                .filter_map(|u| u.get("siren").and_then(Value::as_str))
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use registre_core::testing::{RecordingSleep, ScriptedTransport};
    use serde_json::json;

    fn config() -> Config {
        Config {
            search_url: "https://insee.test/siren".into(),
            api_key: "k".into(),
            ..Default::default()
        }
    }

    fn chunk() -> Vec<String> {
        vec!["552100554".into(), "443061841".into()]
    }

    #[test]
    fn query_shape() {
        assert_eq!(search_query(&chunk()), "(siren:552100554 OR siren:443061841)");
    }

    #[test]
    fn returns_listed_units() {
        let t = ScriptedTransport::new();
        t.respond_json(200, json!({"unitesLegales": [{"siren": "552100554"}]}));
        let mut client = build_client(&config(), t, RecordingSleep::new());

        let found = batch_diffusible_exists(&mut client, "https://insee.test/siren", &chunk()).unwrap();
        assert_eq!(found.into_iter().collect::<Vec<_>>(), vec!["552100554"]);
        let req = &client.transport().requests()[0];
        assert_eq!(req.url, "https://insee.test/siren");
        assert_eq!(req.query_param("champs"), Some("siren"));
        assert_eq!(req.query_param("nombre"), Some("2"));
        assert_eq!(req.header("x-insee-api-key-integration"), Some("k"));
    }

    #[test]
    fn not_found_soft_fails() {
        let t = ScriptedTransport::new();
        t.respond(404, "{\"header\": {\"statut\": 404}}");
        let mut client = build_client(&config(), t, RecordingSleep::new());
        assert!(batch_diffusible_exists(&mut client, "https://insee.test/siren", &chunk())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn rate_window_is_waited_out() {
        let t = ScriptedTransport::new();
        t.respond_with_headers(429, "", &[("retry-after", "10")])
            .respond_json(200, json!({"unitesLegales": [{"siren": "443061841"}]}));
        let sleeper = RecordingSleep::new();
        let mut client = build_client(&config(), t, sleeper.clone());

        let found = batch_diffusible_exists(&mut client, "https://insee.test/siren", &chunk()).unwrap();
        assert!(found.contains("443061841"));
        assert_eq!(sleeper.count(), 1);
        assert!(sleeper.recorded()[0] >= std::time::Duration::from_secs(10));
    }
}
