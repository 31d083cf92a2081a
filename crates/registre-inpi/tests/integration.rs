//! Batch-level behaviour against a scripted INPI

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use registre_core::testing::{RecordingSleep, ScriptedTransport};
use registre_core::{ProgressContext, RetryPolicy, RunOutcome, TokenStore};
use registre_inpi::{Config, api, pack, runner};
use serde_json::{Value, json};

fn config(dir: &Path) -> Config {
    Config {
        base_url: "https://inpi.test".into(),
        username: "u".into(),
        password: "p".into(),
        token_file: dir.join("token.txt"),
        metadata_rpm: 0,
        download_rpm: 0,
        pause_between_sirens: Duration::ZERO,
        pause_after_download: Duration::ZERO,
        output_dir: dir.join("out"),
        probe: false,
        retry: RetryPolicy::default(),
        ..Default::default()
    }
}

fn attachments(ids: &[(&str, &str)]) -> Value {
    let actes: Vec<Value> = ids
        .iter()
        .map(|(id, label)| {
            json!({
                "id": id,
                "nomDocument": format!("{label}.pdf"),
                "typeRdd": [{"typeActe": label}],
                "confidentiality": "Public"
            })
        })
        .collect();
    json!({ "actes": actes })
}

fn sirens(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[test]
fn downloads_only_allowed_types() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path());
    TokenStore::new(&cfg.token_file).save("tok").unwrap();

    let t = ScriptedTransport::new();
    t.respond_json(
        200,
        attachments(&[("a1", "Statuts constitutifs"), ("a2", "Statuts modificatifs")]),
    )
    .respond(200, "%PDF-a1");
    let sleeper = RecordingSleep::new();
    let mut client = api::build_client(&cfg, t, sleeper.clone());

    let stats = runner::run(&mut client, &cfg, &sirens(&["552100554"]), &ProgressContext::hidden())
        .unwrap();
    assert_eq!(stats.outcome, RunOutcome::Completed);
    assert_eq!(stats.found, 1);
    assert_eq!(stats.downloaded, 1);
    let saved = std::fs::read(cfg.output_dir.join("552100554_a1.pdf")).unwrap();
    assert_eq!(saved, b"%PDF-a1");
    assert!(!cfg.output_dir.join("552100554_a2.pdf").exists());
    assert_eq!(client.transport().request_count(), 2);
}

#[test]
fn three_server_errors_then_saved() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path());
    TokenStore::new(&cfg.token_file).save("tok").unwrap();

    let t = ScriptedTransport::new();
    t.respond_json(200, attachments(&[("a1", "Attestation bancaire")]))
        .respond(502, "")
        .respond(503, "")
        .respond(500, "")
        .respond(200, "%PDF");
    let sleeper = RecordingSleep::new();
    let mut client = api::build_client(&cfg, t, sleeper.clone());

    let stats = runner::run(&mut client, &cfg, &sirens(&["552100554"]), &ProgressContext::hidden())
        .unwrap();
    assert_eq!(stats.downloaded, 1);
    assert_eq!(sleeper.count(), 3);
    assert_eq!(client.transport().request_count(), 5);
    assert!(cfg.output_dir.join("552100554_a1.pdf").exists());
}

#[test]
fn quota_halts_remaining_sirens() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path());
    TokenStore::new(&cfg.token_file).save("tok").unwrap();

    let t = ScriptedTransport::new();
    t.respond_json(200, attachments(&[]))
        .respond_with_headers(429, "", &[("retry-after", "86400")])
        // never reached
        .respond_json(200, attachments(&[]));
    let mut client = api::build_client(&cfg, t, RecordingSleep::new());

    let list = sirens(&["552100554", "443061841", "732829320"]);
    let stats = runner::run(&mut client, &cfg, &list, &ProgressContext::hidden()).unwrap();
    assert_eq!(
        stats.outcome,
        RunOutcome::QuotaStopped {
            retry_after: Some(Duration::from_secs(86400))
        }
    );
    assert_eq!(client.transport().request_count(), 2);
    assert_eq!(client.transport().remaining(), 1);
    assert_eq!(stats.processed, 2);
}

#[test]
fn first_call_401_relogs_once() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path());
    TokenStore::new(&cfg.token_file).save("expired").unwrap();

    let t = ScriptedTransport::new();
    t.respond(401, "")
        .respond_json(200, json!({"token": "fresh"}))
        .respond_json(200, attachments(&[]));
    let mut client = api::build_client(&cfg, t, RecordingSleep::new());

    let stats = runner::run(&mut client, &cfg, &sirens(&["552100554"]), &ProgressContext::hidden())
        .unwrap();
    assert_eq!(stats.outcome, RunOutcome::Completed);
    let reqs = client.transport().requests();
    assert_eq!(reqs.len(), 3);
    assert_eq!(reqs[0].url, reqs[2].url);
    assert_eq!(reqs[2].header("authorization"), Some("Bearer fresh"));
}

#[test]
fn login_failure_aborts() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path());

    let t = ScriptedTransport::new();
    t.respond(401, "bad credentials");
    let mut client = api::build_client(&cfg, t, RecordingSleep::new());

    let err = runner::run(&mut client, &cfg, &sirens(&["552100554"]), &ProgressContext::hidden())
        .unwrap_err();
    assert!(format!("{err:#}").contains("login failed"));
    assert_eq!(client.transport().request_count(), 1);
}

#[test]
fn forbidden_siren_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path());
    TokenStore::new(&cfg.token_file).save("tok").unwrap();

    let t = ScriptedTransport::new();
    t.respond(403, "")
        .respond_json(200, attachments(&[("b1", "Statuts constitutifs")]))
        .respond(200, "%PDF");
    let mut client = api::build_client(&cfg, t, RecordingSleep::new());

    let stats = runner::run(
        &mut client,
        &cfg,
        &sirens(&["552100554", "443061841"]),
        &ProgressContext::hidden(),
    )
    .unwrap();
    assert_eq!(stats.skipped, vec!["552100554"]);
    assert_eq!(stats.downloaded, 1);
}

#[test]
fn existing_file_counts_without_download() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path());
    TokenStore::new(&cfg.token_file).save("tok").unwrap();
    std::fs::create_dir_all(&cfg.output_dir).unwrap();
    std::fs::write(cfg.output_dir.join("552100554_a1.pdf"), b"%PDF-old").unwrap();

    let t = ScriptedTransport::new();
    t.respond_json(200, attachments(&[("a1", "Statuts constitutifs")]));
    let mut client = api::build_client(&cfg, t, RecordingSleep::new());

    let stats = runner::run(&mut client, &cfg, &sirens(&["552100554"]), &ProgressContext::hidden())
        .unwrap();
    assert_eq!(stats.downloaded, 1);
    assert_eq!(client.transport().request_count(), 1);
}

#[test]
fn pack_writes_base64_json() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path());
    TokenStore::new(&cfg.token_file).save("tok").unwrap();

    let t = ScriptedTransport::new();
    t.respond_json(200, attachments(&[("a1", "Statuts constitutifs")]))
        .respond(200, "%PDF-1.4");
    let mut client = api::build_client(&cfg, t, Arc::new(registre_core::ThreadSleep));

    let stats = pack::run(&mut client, &cfg, &sirens(&["552100554"]), &ProgressContext::hidden())
        .unwrap();
    assert_eq!(stats.downloaded, 1);

    let text = std::fs::read_to_string(cfg.output_dir.join("inpi_actes_552100554.json")).unwrap();
    let entries: Value = serde_json::from_str(&text).unwrap();
    let entry = &entries[0];
    assert_eq!(entry["siren"], "552100554");
    assert_eq!(entry["typeActe"], "Statuts constitutifs");
    assert_eq!(entry["id"], "a1");
    assert_eq!(entry["mime"], "application/pdf");
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(entry["document_base64"].as_str().unwrap())
        .unwrap();
    assert_eq!(decoded, b"%PDF-1.4");
}

#[test]
fn skipped_siren_still_waits_before_next() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config(dir.path());
    cfg.pause_between_sirens = Duration::from_secs(1);
    TokenStore::new(&cfg.token_file).save("tok").unwrap();

    let t = ScriptedTransport::new();
    t.respond(403, "").respond_json(200, attachments(&[]));
    let sleeper = RecordingSleep::new();
    let mut client = api::build_client(&cfg, t, sleeper.clone());

    let list = sirens(&["552100554", "443061841"]);
    let stats = runner::run(&mut client, &cfg, &list, &ProgressContext::hidden()).unwrap();
    assert_eq!(stats.skipped, vec!["552100554"]);
    let slept = sleeper.recorded();
    assert_eq!(slept.len(), 1);
    assert!(slept[0] >= Duration::from_secs(1));
}

#[test]
fn pack_skipped_siren_still_waits_before_next() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config(dir.path());
    cfg.pause_between_sirens = Duration::from_secs(1);
    TokenStore::new(&cfg.token_file).save("tok").unwrap();

    let t = ScriptedTransport::new();
    t.respond(403, "").respond_json(200, attachments(&[]));
    let sleeper = RecordingSleep::new();
    let mut client = api::build_client(&cfg, t, sleeper.clone());

    let list = sirens(&["552100554", "443061841"]);
    let stats = pack::run(&mut client, &cfg, &list, &ProgressContext::hidden()).unwrap();
    assert_eq!(stats.skipped, vec!["552100554"]);
    assert_eq!(stats.processed, 2);
    let slept = sleeper.recorded();
    assert_eq!(slept.len(), 1);
    assert!(slept[0] >= Duration::from_secs(1));
    assert!(cfg.output_dir.join("inpi_actes_443061841.json").exists());
}

#[test]
fn pack_with_failed_download_is_reported_failed() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path());
    TokenStore::new(&cfg.token_file).save("tok").unwrap();

    let t = ScriptedTransport::new();
    t.respond_json(
        200,
        attachments(&[("a1", "Statuts constitutifs"), ("a2", "Attestation bancaire")]),
    )
    .respond(200, "%PDF-a1")
    .respond(404, "");
    let mut client = api::build_client(&cfg, t, RecordingSleep::new());

    let stats = pack::run(&mut client, &cfg, &sirens(&["552100554"]), &ProgressContext::hidden())
        .unwrap();
    assert_eq!(stats.downloaded, 1);
    assert_eq!(stats.errors, 1);
    let item = &stats.items[0];
    assert_eq!(item.status, "failed");
    assert_eq!(item.found, 2);
    assert!(item.detail.starts_with("a2:"));
}
