use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::config::Config;
use crate::error::RagError;
use crate::http::{Auth, HttpClient};

#[derive(Clone, Debug, PartialEq)]
pub struct Hit {
    pub id: String,
    pub score: f32,
    pub text: String,
}

/// Read-only similarity search over the remote index.
pub trait VectorIndex: Send + Sync {
    fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<Hit>, RagError>;
}

#[derive(Deserialize)]
struct DescribeIndex {
    host: String,
    status: Option<IndexStatus>,
}

#[derive(Deserialize)]
struct IndexStatus {
    #[serde(default)]
    ready: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<Match>,
}

#[derive(Deserialize)]
struct Match {
    id: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: Option<Map<String, Value>>,
}

pub(crate) struct PineconeIndex {
    http: HttpClient,
    query_url: String,
    namespace: Option<String>,
    api_key: String,
    api_version: String,
}

impl PineconeIndex {
    /// Resolves the data-plane host of the configured index.
    pub(crate) fn connect(http: HttpClient, cfg: &Config) -> Result<Self, RagError> {
        let url = format!("{}/indexes/{}", cfg.pinecone_control_url, cfg.pinecone_index);
        let auth = Auth::ApiKey {
            key: &cfg.pinecone_api_key,
            version: &cfg.pinecone_api_version,
        };
        let desc = http
            .get_json::<DescribeIndex>(&url, auth)
            .map_err(RagError::service_unavailable)?;
        let host = resolve_host(desc, &cfg.pinecone_index)?;
        info!(index = %cfg.pinecone_index, host = %host, "resolved index host");
        Ok(Self {
            http,
            query_url: format!("{}/query", host.trim_end_matches('/')),
            namespace: cfg.pinecone_namespace.clone(),
            api_key: cfg.pinecone_api_key.clone(),
            api_version: cfg.pinecone_api_version.clone(),
        })
    }
}

impl VectorIndex for PineconeIndex {
    fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<Hit>, RagError> {
        if vector.is_empty() || top_k == 0 {
            return Ok(vec![]);
        }
        let req = QueryRequest {
            vector,
            top_k,
            include_metadata: true,
            namespace: self.namespace.as_deref(),
        };
        let auth = Auth::ApiKey {
            key: &self.api_key,
            version: &self.api_version,
        };
        let res = self
            .http
            .post_json::<QueryResponse, _>(&self.query_url, auth, &req)
            .map_err(RagError::service_unavailable)?;
        let total = res.matches.len();
        let hits = hits_from_response(res);
        debug!(matches = total, with_text = hits.len(), "index query returned");
        Ok(hits)
    }
}

fn resolve_host(desc: DescribeIndex, index: &str) -> Result<String, RagError> {
    if desc.status.is_some_and(|s| !s.ready) {
        return Err(RagError::ServiceUnavailable(format!(
            "index {} is not ready",
            index
        )));
    }
    if desc.host.starts_with("http://") || desc.host.starts_with("https://") {
        Ok(desc.host)
    } else {
        Ok(format!("https://{}", desc.host))
    }
}

/// Matches without chunk text carry nothing to ground a reply on.
fn hits_from_response(res: QueryResponse) -> Vec<Hit> {
    res.matches
        .into_iter()
        .filter_map(|m| {
            let text = m.metadata.as_ref().and_then(chunk_text_from_metadata)?;
            Some(Hit {
                id: m.id,
                score: m.score,
                text,
            })
        })
        .collect()
}

/// Node text is stored either flat under `text` or inside the serialized
/// node document under `_node_content`.
pub fn chunk_text_from_metadata(metadata: &Map<String, Value>) -> Option<String> {
    if let Some(text) = metadata.get("text").and_then(Value::as_str) {
        if !text.trim().is_empty() {
            return Some(text.to_string());
        }
    }
    let raw = metadata.get("_node_content")?.as_str()?;
    let node: Value = serde_json::from_str(raw).ok()?;
    node.get("text")
        .and_then(Value::as_str)
        .filter(|t| !t.trim().is_empty())
        .map(str::to_string)
}

/// Highest score first. Equal scores keep the order the service returned.
pub fn rank_hits(mut hits: Vec<Hit>, top_k: usize) -> Vec<Hit> {
    hits.sort_by(|a, b| b.score.total_cmp(&a.score));
    hits.truncate(top_k);
    hits
}
