//! Concierge Door Library
//!
//! Face-recognition door access with a human triage feedback loop.
//!
//! ## Architecture
//!
//! Capabilities (traits, injected):
//! 1. ObjectStore - artifact storage
//! 2. FaceMatcher - face search / enrollment
//! 3. ActuationChannel - door command publishing
//! 4. NotificationSink - chat webhook
//! 5. RateLimitStore - atomic grace-window claims
//! 6. AuthorizationFunction - second factor
//!
//! Components:
//! 1. ObjectRelocator - moves artifacts to their classification folder
//! 2. Thumbnailer - best-effort downscaled copies
//! 3. IdentityResolver - zero-or-one identity per image
//! 4. RateLimiter - duplicate-open suppression
//! 5. SecondFactorGate - optional external authorization
//! 6. AccessEventPipeline - capture → identity → door → notification
//! 7. LabelingPipeline - train / discard of unknown faces
//! 8. WebAPI - HTTP ingress

pub mod access_pipeline;
pub mod actuation_channel;
pub mod identity_resolver;
pub mod labeling_pipeline;
pub mod notifier;
pub mod object_relocator;
pub mod object_store;
pub mod rate_limiter;
pub mod second_factor;
pub mod thumbnailer;
pub mod web_api;
pub mod models;
pub mod error;
pub mod state;

pub use error::{Error, Result};
pub use state::{AppConfig, AppState, Capabilities};
