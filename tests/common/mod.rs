//! Shared fakes for pipeline integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use concierge_door::actuation_channel::{ActuationChannel, CommandPayload};
use concierge_door::identity_resolver::{FaceCandidate, FaceMatcher, ImageRef};
use concierge_door::notifier::{MessageCard, NotificationSink};
use concierge_door::object_store::{Acl, ObjectStore};
use concierge_door::rate_limiter::{MemoryRateLimitStore, RateLimitStore};
use concierge_door::second_factor::{AuthorizationFunction, FunctionRef};
use concierge_door::{AppConfig, Capabilities, Error, Result};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{Arc, Mutex};

pub const BUCKET: &str = "test-bucket";
pub const PUBLIC_BASE: &str = "https://files.test";
pub const TRAIN_URL: &str = "https://door.test/api/label";

/// Small valid JPEG
pub fn sample_jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([120, 80, 200]));
    let mut out = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut out, image::ImageFormat::Jpeg)
        .unwrap();
    out.into_inner()
}

// ========================================
// Object store
// ========================================

#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<String, (Vec<u8>, Acl)>>,
    ops: Mutex<Vec<String>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: &str, body: Vec<u8>) {
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), (body, Acl::Private));
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }

    pub fn acl(&self, key: &str) -> Option<Acl> {
        self.objects.lock().unwrap().get(key).map(|(_, acl)| *acl)
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.keys()
            .into_iter()
            .filter(|k| k.starts_with(prefix))
            .collect()
    }

    /// Operation log, e.g. `copy a -> b`, `delete a`
    pub fn ops(&self) -> Vec<String> {
        self.ops.lock().unwrap().clone()
    }

    fn record(&self, op: String) {
        self.ops.lock().unwrap().push(op);
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    fn bucket(&self) -> &str {
        BUCKET
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}/{}", PUBLIC_BASE, BUCKET, key)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.contains(key))
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .map(|(body, _)| body.clone())
            .ok_or_else(|| Error::NotFound(key.to_string()))
    }

    async fn put(&self, key: &str, body: Vec<u8>, _content_type: &str, acl: Acl) -> Result<()> {
        self.record(format!("put {}", key));
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), (body, acl));
        Ok(())
    }

    async fn copy(&self, source_key: &str, dest_key: &str, acl: Acl) -> Result<()> {
        self.record(format!("copy {} -> {}", source_key, dest_key));
        let mut objects = self.objects.lock().unwrap();
        let body = objects
            .get(source_key)
            .map(|(body, _)| body.clone())
            .ok_or_else(|| Error::NotFound(source_key.to_string()))?;
        objects.insert(dest_key.to_string(), (body, acl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.record(format!("delete {}", key));
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }
}

// ========================================
// Face matcher
// ========================================

#[derive(Default)]
pub struct ScriptedMatcher {
    candidates: Mutex<Vec<FaceCandidate>>,
    fail_search: Mutex<bool>,
    fail_keys: Mutex<Vec<String>>,
    fail_index: Mutex<bool>,
    indexed: Mutex<Vec<(String, String)>>,
}

impl ScriptedMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_match(identity: &str, confidence: f32) -> Self {
        let matcher = Self::default();
        matcher.candidates.lock().unwrap().push(FaceCandidate {
            identity: identity.to_string(),
            confidence,
        });
        matcher
    }

    pub fn failing_search() -> Self {
        let matcher = Self::default();
        *matcher.fail_search.lock().unwrap() = true;
        matcher
    }

    /// Fail searches for one key only
    pub fn fail_search_on(&self, key: &str) {
        self.fail_keys.lock().unwrap().push(key.to_string());
    }

    pub fn clear_search_failures(&self) {
        self.fail_keys.lock().unwrap().clear();
    }

    pub fn fail_index(&self) {
        *self.fail_index.lock().unwrap() = true;
    }

    /// `(key, external_id)` pairs passed to `index_faces`
    pub fn indexed(&self) -> Vec<(String, String)> {
        self.indexed.lock().unwrap().clone()
    }
}

#[async_trait]
impl FaceMatcher for ScriptedMatcher {
    async fn search_faces(
        &self,
        image: &ImageRef,
        _max_faces: u32,
        _threshold: f32,
    ) -> Result<Vec<FaceCandidate>> {
        if *self.fail_search.lock().unwrap() || self.fail_keys.lock().unwrap().contains(&image.key) {
            return Err(Error::FaceMatcher("search unavailable".to_string()));
        }
        Ok(self.candidates.lock().unwrap().clone())
    }

    async fn index_faces(&self, image: &ImageRef, external_id: &str) -> Result<usize> {
        if *self.fail_index.lock().unwrap() {
            return Err(Error::FaceMatcher("index unavailable".to_string()));
        }
        self.indexed
            .lock()
            .unwrap()
            .push((image.key.clone(), external_id.to_string()));
        Ok(1)
    }
}

// ========================================
// Actuation
// ========================================

#[derive(Default)]
pub struct RecordingChannel {
    published: Mutex<Vec<(String, CommandPayload, u8)>>,
    fail: Mutex<bool>,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let channel = Self::default();
        *channel.fail.lock().unwrap() = true;
        channel
    }

    pub fn published(&self) -> Vec<(String, CommandPayload, u8)> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl ActuationChannel for RecordingChannel {
    async fn publish(&self, topic: &str, payload: &CommandPayload, qos: u8) -> Result<()> {
        if *self.fail.lock().unwrap() {
            return Err(Error::Actuation("broker unreachable".to_string()));
        }
        self.published
            .lock()
            .unwrap()
            .push((topic.to_string(), payload.clone(), qos));
        Ok(())
    }
}

// ========================================
// Notifier
// ========================================

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<MessageCard>>,
    fail: Mutex<bool>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let notifier = Self::default();
        *notifier.fail.lock().unwrap() = true;
        notifier
    }

    pub fn sent(&self) -> Vec<MessageCard> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingNotifier {
    async fn send(&self, card: &MessageCard) -> Result<()> {
        if *self.fail.lock().unwrap() {
            return Err(Error::Notifier("webhook returned 500".to_string()));
        }
        self.sent.lock().unwrap().push(card.clone());
        Ok(())
    }
}

// ========================================
// Second factor
// ========================================

pub struct ScriptedAuthorizer {
    response: Vec<u8>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedAuthorizer {
    pub fn responding(response: &str) -> Self {
        Self {
            response: response.as_bytes().to_vec(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Raw payloads received
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuthorizationFunction for ScriptedAuthorizer {
    async fn invoke(&self, _function: &FunctionRef, payload: &[u8]) -> Result<Vec<u8>> {
        self.calls
            .lock()
            .unwrap()
            .push(String::from_utf8_lossy(payload).into_owned());
        Ok(self.response.clone())
    }
}

// ========================================
// Harness
// ========================================

pub struct Harness {
    pub store: Arc<MemoryObjectStore>,
    pub matcher: Arc<ScriptedMatcher>,
    pub channel: Arc<RecordingChannel>,
    pub notifier: Arc<RecordingNotifier>,
    pub rate_store: Arc<MemoryRateLimitStore>,
    pub authorizer: Option<Arc<ScriptedAuthorizer>>,
}

impl Harness {
    pub fn new(matcher: ScriptedMatcher) -> Self {
        Self {
            store: Arc::new(MemoryObjectStore::new()),
            matcher: Arc::new(matcher),
            channel: Arc::new(RecordingChannel::new()),
            notifier: Arc::new(RecordingNotifier::new()),
            rate_store: Arc::new(MemoryRateLimitStore::new()),
            authorizer: None,
        }
    }

    pub fn with_channel(mut self, channel: RecordingChannel) -> Self {
        self.channel = Arc::new(channel);
        self
    }

    pub fn with_notifier(mut self, notifier: RecordingNotifier) -> Self {
        self.notifier = Arc::new(notifier);
        self
    }

    pub fn with_authorizer(mut self, authorizer: ScriptedAuthorizer) -> Self {
        self.authorizer = Some(Arc::new(authorizer));
        self
    }

    pub fn capabilities(&self) -> Capabilities {
        let rate_store: Arc<dyn RateLimitStore> = self.rate_store.clone();
        Capabilities {
            face_matcher: self.matcher.clone(),
            object_store: self.store.clone(),
            actuation: self.channel.clone(),
            notifier: self.notifier.clone(),
            rate_limit_store: Some(rate_store),
            authorization: self
                .authorizer
                .clone()
                .map(|a| a as Arc<dyn AuthorizationFunction>),
        }
    }
}

/// Config with every optional feature off
pub fn base_config() -> AppConfig {
    let mut config = AppConfig::from_lookup(|_| None).unwrap();
    config.bucket_name = BUCKET.to_string();
    config.train_url = TRAIN_URL.to_string();
    config
}

pub fn config_with(pairs: &[(&str, &str)]) -> AppConfig {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let mut config = AppConfig::from_lookup(move |key| map.get(key).cloned()).unwrap();
    config.bucket_name = BUCKET.to_string();
    config.train_url = TRAIN_URL.to_string();
    config
}
