use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::RagError;
use crate::http::{Auth, HttpClient};

pub trait Embedder: Send + Sync {
    fn embed_query(&self, text: &str) -> Result<Vec<f32>, RagError>;
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    #[serde(default)]
    data: Vec<EmbeddingRow>,
}

#[derive(Deserialize)]
struct EmbeddingRow {
    embedding: Vec<f32>,
}

pub(crate) struct TogetherEmbedder {
    http: HttpClient,
    url: String,
    model: String,
    api_key: String,
}

impl TogetherEmbedder {
    pub(crate) fn new(http: HttpClient, cfg: &Config) -> Self {
        Self {
            http,
            url: format!("{}/v1/embeddings", cfg.together_url),
            model: cfg.embed_model.clone(),
            api_key: cfg.together_api_key.clone(),
        }
    }
}

impl Embedder for TogetherEmbedder {
    fn embed_query(&self, text: &str) -> Result<Vec<f32>, RagError> {
        let req = EmbedRequest {
            model: &self.model,
            input: text,
        };
        let res = self
            .http
            .post_json::<EmbedResponse, _>(&self.url, Auth::Bearer(&self.api_key), &req)
            .map_err(RagError::service_unavailable)?;
        first_embedding(res, &self.model)
    }
}

fn first_embedding(res: EmbedResponse, model: &str) -> Result<Vec<f32>, RagError> {
    match res.data.into_iter().next() {
        Some(row) if !row.embedding.is_empty() => Ok(row.embedding),
        _ => Err(RagError::ServiceUnavailable(format!(
            "no embedding returned by {}",
            model
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODEL: &str = "togethercomputer/m2-bert-80M-8k-retrieval";

    #[test]
    fn request_sends_single_input_string() {
        let body = serde_json::to_value(EmbedRequest { model: MODEL, input: "leaving my room" })
            .expect("request should serialize");
        assert_eq!(body["model"], MODEL);
        assert_eq!(body["input"], "leaving my room");
    }

    #[test]
    fn first_row_is_the_query_vector() {
        let res: EmbedResponse = serde_json::from_str(
            r#"{"object":"list","data":[{"object":"embedding","index":0,"embedding":[0.25,-0.5,1.0]}]}"#,
        )
        .expect("response should decode");
        assert_eq!(first_embedding(res, MODEL).expect("vector"), vec![0.25, -0.5, 1.0]);
    }

    #[test]
    fn missing_or_empty_vector_is_service_unavailable() {
        let no_rows: EmbedResponse = serde_json::from_str(r#"{"data":[]}"#).expect("decode");
        let err = first_embedding(no_rows, MODEL).expect_err("no rows should fail");
        assert!(matches!(err, RagError::ServiceUnavailable(ref m) if m.contains(MODEL)));

        let empty_row: EmbedResponse =
            serde_json::from_str(r#"{"data":[{"embedding":[]}]}"#).expect("decode");
        assert!(matches!(
            first_embedding(empty_row, MODEL),
            Err(RagError::ServiceUnavailable(_))
        ));
    }
}
