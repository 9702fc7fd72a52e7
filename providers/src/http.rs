//! HTTP clients for the OCR and face-biometrics gateways.
//!
//! Gateway contract (JSON, PascalCase fields as the managed services emit):
//! - `POST {ocr}/analyze` `{"Key": ..}` → `{"Blocks": [..]}`
//! - `POST {bio}/liveness/sessions` → `{"SessionId": ..}`
//! - `GET  {bio}/liveness/sessions/{id}` → `{"Status", "Confidence", "ReferenceImage": {"Bytes"}}`
//! - `POST {bio}/faces/compare` → `{"FaceMatches": [{"Similarity": ..}]}`
//!
//! Raw payloads are converted into the closed types of
//! `nexus_verification::blocks` at this boundary.

use async_trait::async_trait;
use base64::Engine;
use nexus_types::LivenessStatus;
use nexus_verification::{
    BiometricProvider, Block, BlockKind, DocumentAnalyzer, FaceMatch, LivenessResult,
    ProviderError, Relationship, RelationshipKind,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default timeout for gateway requests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Default connection timeout.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared JSON-over-HTTP plumbing for one gateway.
#[derive(Clone)]
pub struct GatewayClient {
    /// HTTP client (reusable connection pool).
    http_client: reqwest::Client,
    base_url: String,
}

impl GatewayClient {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ProviderError> {
        let request = self.http_client.get(self.url(path));
        send(request, path).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ProviderError> {
        let request = self.http_client.post(self.url(path)).json(body);
        send(request, path).await
    }
}

async fn send<T: DeserializeOwned>(
    request: reqwest::RequestBuilder,
    what: &str,
) -> Result<T, ProviderError> {
    let response = request.send().await.map_err(|e| {
        if e.is_timeout() {
            ProviderError::Unavailable(format!("request timed out: {e}"))
        } else if e.is_connect() {
            ProviderError::Unavailable(format!("connection failed: {e}"))
        } else {
            ProviderError::RequestFailed(e.to_string())
        }
    })?;

    let status = response.status();
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(ProviderError::NotFound(what.to_string()));
    }
    if !status.is_success() {
        return Err(ProviderError::RequestFailed(format!("HTTP status {status}")));
    }

    response
        .json()
        .await
        .map_err(|e| ProviderError::InvalidResponse(format!("failed to parse {what}: {e}")))
}

// ── OCR ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawAnalysis {
    #[serde(default)]
    blocks: Vec<RawBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawBlock {
    id: String,
    #[serde(default)]
    block_type: String,
    #[serde(default)]
    entity_types: Vec<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    relationships: Vec<RawRelationship>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawRelationship {
    #[serde(rename = "Type")]
    kind: String,
    #[serde(default)]
    ids: Vec<String>,
}

impl From<RawBlock> for Block {
    fn from(raw: RawBlock) -> Self {
        let kind = match raw.block_type.as_str() {
            "KEY_VALUE_SET" if raw.entity_types.iter().any(|t| t == "KEY") => BlockKind::Key,
            "KEY_VALUE_SET" if raw.entity_types.iter().any(|t| t == "VALUE") => BlockKind::Value,
            "WORD" => BlockKind::Word {
                text: raw.text.unwrap_or_default(),
            },
            _ => BlockKind::Other,
        };
        let relationships = raw
            .relationships
            .into_iter()
            .map(|r| Relationship {
                kind: match r.kind.as_str() {
                    "VALUE" => RelationshipKind::Value,
                    "CHILD" => RelationshipKind::Child,
                    _ => RelationshipKind::Other,
                },
                ids: r.ids,
            })
            .collect();
        Block {
            id: raw.id,
            kind,
            relationships,
        }
    }
}

/// Structured document analysis via the OCR gateway.
pub struct HttpDocumentAnalyzer {
    client: GatewayClient,
}

impl HttpDocumentAnalyzer {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            client: GatewayClient::new(base_url, timeout),
        }
    }
}

#[async_trait]
impl DocumentAnalyzer for HttpDocumentAnalyzer {
    async fn analyze_document(&self, key: &str) -> Result<Vec<Block>, ProviderError> {
        let raw: RawAnalysis = self
            .client
            .post("analyze", &serde_json::json!({ "Key": key }))
            .await?;
        Ok(raw.blocks.into_iter().map(Block::from).collect())
    }
}

// ── Biometrics ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawSession {
    session_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawImage {
    bytes: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawLiveness {
    status: String,
    #[serde(default)]
    confidence: Option<f32>,
    #[serde(default)]
    reference_image: Option<RawImage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawCompare {
    #[serde(default)]
    face_matches: Vec<RawFaceMatch>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawFaceMatch {
    similarity: f32,
}

fn liveness_status(raw: &str) -> Result<LivenessStatus, ProviderError> {
    match raw {
        "CREATED" => Ok(LivenessStatus::Created),
        "IN_PROGRESS" => Ok(LivenessStatus::InProgress),
        "SUCCEEDED" => Ok(LivenessStatus::Succeeded),
        // An expired challenge can never succeed.
        "FAILED" | "EXPIRED" => Ok(LivenessStatus::Failed),
        other => Err(ProviderError::InvalidResponse(format!(
            "unknown liveness status {other:?}"
        ))),
    }
}

impl TryFrom<RawLiveness> for LivenessResult {
    type Error = ProviderError;

    fn try_from(raw: RawLiveness) -> Result<Self, Self::Error> {
        let reference_image = raw
            .reference_image
            .map(|img| {
                base64::engine::general_purpose::STANDARD
                    .decode(img.bytes)
                    .map_err(|e| ProviderError::InvalidResponse(format!("reference image: {e}")))
            })
            .transpose()?;
        Ok(Self {
            status: liveness_status(&raw.status)?,
            confidence: raw.confidence,
            reference_image,
        })
    }
}

/// Liveness sessions and face comparison via the biometrics gateway.
pub struct HttpBiometricProvider {
    client: GatewayClient,
}

impl HttpBiometricProvider {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            client: GatewayClient::new(base_url, timeout),
        }
    }
}

#[async_trait]
impl BiometricProvider for HttpBiometricProvider {
    async fn create_liveness_session(&self) -> Result<String, ProviderError> {
        let raw: RawSession = self
            .client
            .post("liveness/sessions", &serde_json::json!({}))
            .await?;
        Ok(raw.session_id)
    }

    async fn get_liveness_result(
        &self,
        session_id: &str,
    ) -> Result<LivenessResult, ProviderError> {
        if session_id.contains('/') {
            return Err(ProviderError::NotFound(session_id.to_string()));
        }
        let raw: RawLiveness = self
            .client
            .get(&format!("liveness/sessions/{session_id}"))
            .await?;
        raw.try_into()
    }

    async fn compare_faces(
        &self,
        source: &[u8],
        target: &[u8],
        similarity_threshold: f32,
    ) -> Result<Vec<FaceMatch>, ProviderError> {
        let engine = base64::engine::general_purpose::STANDARD;
        let body = serde_json::json!({
            "SourceImage": { "Bytes": engine.encode(source) },
            "TargetImage": { "Bytes": engine.encode(target) },
            "SimilarityThreshold": similarity_threshold,
        });
        let raw: RawCompare = self.client.post("faces/compare", &body).await?;
        let mut matches: Vec<FaceMatch> = raw
            .face_matches
            .into_iter()
            .map(|m| FaceMatch {
                similarity: m.similarity,
            })
            .collect();
        matches.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nexus_verification::extract_fields;

    #[test]
    fn raw_blocks_convert_and_extract() {
        let payload = r#"{
            "Blocks": [
                {"Id": "p", "BlockType": "PAGE", "Relationships": [{"Type": "CHILD", "Ids": ["k", "v"]}]},
                {"Id": "k", "BlockType": "KEY_VALUE_SET", "EntityTypes": ["KEY"],
                 "Relationships": [{"Type": "VALUE", "Ids": ["v"]}, {"Type": "CHILD", "Ids": ["w1", "w2"]}]},
                {"Id": "v", "BlockType": "KEY_VALUE_SET", "EntityTypes": ["VALUE"],
                 "Relationships": [{"Type": "CHILD", "Ids": ["w3"]}]},
                {"Id": "w1", "BlockType": "WORD", "Text": "Document"},
                {"Id": "w2", "BlockType": "WORD", "Text": "No.:"},
                {"Id": "w3", "BlockType": "WORD", "Text": "X1234567"}
            ]
        }"#;
        let raw: RawAnalysis = serde_json::from_str(payload).unwrap();
        let blocks: Vec<Block> = raw.blocks.into_iter().map(Block::from).collect();
        assert_eq!(blocks[0].kind, BlockKind::Other);
        assert_eq!(blocks[1].kind, BlockKind::Key);
        assert_eq!(blocks[2].kind, BlockKind::Value);

        let fields = extract_fields(&blocks);
        assert_eq!(fields.get("Document No.").map(String::as_str), Some("X1234567"));
    }

    #[test]
    fn liveness_payload_converts() {
        let raw: RawLiveness = serde_json::from_str(
            r#"{"Status": "SUCCEEDED", "Confidence": 97.5, "ReferenceImage": {"Bytes": "ZnJhbWU="}}"#,
        )
        .unwrap();
        let result = LivenessResult::try_from(raw).unwrap();
        assert_eq!(result.status, LivenessStatus::Succeeded);
        assert_eq!(result.confidence, Some(97.5));
        assert_eq!(result.reference_image.as_deref(), Some(&b"frame"[..]));
    }

    #[test]
    fn expired_liveness_counts_as_failed() {
        assert_eq!(liveness_status("EXPIRED").unwrap(), LivenessStatus::Failed);
        assert!(liveness_status("WEIRD").is_err());
    }

    #[test]
    fn missing_face_matches_is_empty() {
        let raw: RawCompare = serde_json::from_str("{}").unwrap();
        assert!(raw.face_matches.is_empty());
    }

    #[test]
    fn urls_join_cleanly() {
        let client = GatewayClient::new("http://bio.local/v1/", DEFAULT_TIMEOUT);
        assert_eq!(client.url("/faces/compare"), "http://bio.local/v1/faces/compare");
    }
}
