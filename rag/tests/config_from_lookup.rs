use std::collections::HashMap;
use std::time::Duration;

use rag::{ChatMode, Config, RagError, SYSTEM_PROMPT};

fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> =
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    move |key: &str| map.get(key).cloned()
}

const KEYS: [(&str, &str); 2] = [("TOGETHER_API_KEY", "tg-key"), ("PINECONE_API_KEY", "pc-key")];

#[test]
fn missing_credentials_are_configuration_errors() {
    let err = Config::from_lookup(lookup(&[("PINECONE_API_KEY", "pc-key")]))
        .expect_err("missing together key should fail");
    assert!(matches!(err, RagError::Configuration(ref m) if m.contains("TOGETHER_API_KEY")));

    let err = Config::from_lookup(lookup(&[("TOGETHER_API_KEY", "tg-key"), ("PINECONE_API_KEY", " ")]))
        .expect_err("blank pinecone key should fail");
    assert!(matches!(err, RagError::Configuration(ref m) if m.contains("PINECONE_API_KEY")));
}

#[test]
fn defaults_match_hosted_setup() {
    let cfg = Config::from_lookup(lookup(&KEYS)).expect("keys present");
    assert_eq!(cfg.chat_model, "meta-llama/Llama-3-70b-chat-hf");
    assert_eq!(cfg.embed_model, "togethercomputer/m2-bert-80M-8k-retrieval");
    assert_eq!(cfg.pinecone_index, "reconnect-db");
    assert_eq!(cfg.top_k, 5);
    assert_eq!(cfg.chat_mode, ChatMode::CondensePlusContext);
    assert_eq!(cfg.system_prompt, SYSTEM_PROMPT);
    assert_eq!(cfg.http_timeout, Duration::from_secs(120));
    assert!(cfg.pinecone_namespace.is_none());
}

#[test]
fn overrides_are_applied() {
    let mut pairs = KEYS.to_vec();
    pairs.extend([
        ("TOGETHER_URL", "http://localhost:8080/"),
        ("RAG_TOP_K", "3"),
        ("RAG_CHAT_MODE", "context"),
        ("PINECONE_NAMESPACE", "guides"),
    ]);
    let cfg = Config::from_lookup(lookup(&pairs)).expect("valid overrides");
    assert_eq!(cfg.together_url, "http://localhost:8080");
    assert_eq!(cfg.top_k, 3);
    assert_eq!(cfg.chat_mode, ChatMode::Context);
    assert_eq!(cfg.pinecone_namespace.as_deref(), Some("guides"));
}

#[test]
fn invalid_values_are_rejected() {
    let mut zero_k = KEYS.to_vec();
    zero_k.push(("RAG_TOP_K", "0"));
    assert!(matches!(Config::from_lookup(lookup(&zero_k)), Err(RagError::Configuration(_))));

    let mut bad_mode = KEYS.to_vec();
    bad_mode.push(("RAG_CHAT_MODE", "agent"));
    assert!(matches!(Config::from_lookup(lookup(&bad_mode)), Err(RagError::Configuration(_))));
}

#[test]
fn debug_output_redacts_keys() {
    let cfg = Config::from_lookup(lookup(&KEYS)).expect("keys present");
    let dbg = format!("{:?}", cfg);
    assert!(!dbg.contains("tg-key"));
    assert!(!dbg.contains("pc-key"));
}
