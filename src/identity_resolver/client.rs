//! HTTP face matcher client
//!
//! Talks to a face-collection service exposing `search` and `index`
//! endpoints per collection.

use super::{FaceCandidate, FaceMatcher, ImageRef};
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Face matcher over HTTP
pub struct HttpFaceMatcher {
    client: reqwest::Client,
    base_url: String,
    collection_id: String,
}

#[derive(Debug, Serialize)]
struct SearchFacesRequest<'a> {
    image: &'a ImageRef,
    max_faces: u32,
    face_match_threshold: f32,
}

#[derive(Debug, Deserialize)]
struct SearchFacesResponse {
    #[serde(default)]
    face_matches: Vec<FaceMatch>,
}

#[derive(Debug, Deserialize)]
struct FaceMatch {
    similarity: f32,
    face: MatchedFace,
}

#[derive(Debug, Deserialize)]
struct MatchedFace {
    #[serde(default)]
    external_image_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct IndexFacesRequest<'a> {
    image: &'a ImageRef,
    external_image_id: &'a str,
    detection_attributes: Vec<&'static str>,
}

#[derive(Debug, Deserialize)]
struct IndexFacesResponse {
    #[serde(default)]
    face_records: Vec<serde_json::Value>,
}

impl HttpFaceMatcher {
    /// Create new matcher client. No request timeout is applied.
    pub fn new(base_url: String, collection_id: String) -> Result<Self> {
        let client = reqwest::Client::builder().build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            collection_id,
        })
    }

    fn collection_url(&self, op: &str) -> String {
        format!(
            "{}/v1/collections/{}/{}",
            self.base_url, self.collection_id, op
        )
    }
}

#[async_trait]
impl FaceMatcher for HttpFaceMatcher {
    async fn search_faces(
        &self,
        image: &ImageRef,
        max_faces: u32,
        threshold: f32,
    ) -> Result<Vec<FaceCandidate>> {
        let url = self.collection_url("search");
        let body = SearchFacesRequest {
            image,
            max_faces,
            face_match_threshold: threshold,
        };

        tracing::debug!(url = %url, key = %image.key, "Searching faces by image");
        let resp = self.client.post(&url).json(&body).send().await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::FaceMatcher(format!(
                "search failed: {} - {}",
                status, body
            )));
        }

        let result: SearchFacesResponse = resp.json().await?;
        tracing::debug!(
            key = %image.key,
            matches = result.face_matches.len(),
            "Search faces response"
        );

        // faces indexed without an external id cannot name anyone
        Ok(result
            .face_matches
            .into_iter()
            .filter_map(|m| {
                m.face.external_image_id.map(|identity| FaceCandidate {
                    identity,
                    confidence: m.similarity,
                })
            })
            .collect())
    }

    async fn index_faces(&self, image: &ImageRef, external_id: &str) -> Result<usize> {
        let url = self.collection_url("index");
        let body = IndexFacesRequest {
            image,
            external_image_id: external_id,
            detection_attributes: vec!["DEFAULT"],
        };

        tracing::debug!(url = %url, key = %image.key, external_id = %external_id, "Indexing faces");
        let resp = self.client.post(&url).json(&body).send().await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::FaceMatcher(format!(
                "index failed: {} - {}",
                status, body
            )));
        }

        let result: IndexFacesResponse = resp.json().await?;
        Ok(result.face_records.len())
    }
}
