//! `lifeline` - a personal-safety alert client
//!
//! This library turns a continuous 3-axis acceleration stream into a
//! debounced shake trigger, and turns that trigger (or an explicit manual
//! action) into a reliable, authenticated emergency alert: evidence upload,
//! location attachment, bearer-authenticated submission with a single
//! transparent credential refresh, and visible degradation when offline.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod auth;
pub mod backend;
pub mod cli;
pub mod config;
pub mod credentials;
pub mod detector;
pub mod dispatch;
pub mod error;
pub mod evidence;
pub mod logging;
pub mod motion;
pub mod reachability;

pub use auth::AuthClient;
pub use backend::{AlertReceipt, AlertRequest, AlertTransport, Coordinates, HttpTransport};
pub use config::Config;
pub use credentials::{CredentialStore, Credentials, FileCredentialStore};
pub use detector::{ShakeDetector, ShakeEvent, ShakeMonitor};
pub use dispatch::{DispatchPipeline, LocationProvider};
pub use error::{Error, Result};
pub use evidence::{EvidenceStore, HttpEvidenceStore, Recording};
pub use logging::init_logging;
pub use motion::{AccelerationSample, SensorSource};
pub use reachability::Reachability;
