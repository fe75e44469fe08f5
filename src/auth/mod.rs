//! Azure AD authentication module.
//!
//! Provides the device-code credential for signed-in users, the client-secret
//! credential for app-only access, and the in-memory token cache they share.

pub mod cache;
pub mod client_secret;
pub mod credential;
pub mod device_code;
pub mod token;

pub use client_secret::ClientSecretCredential;
pub use credential::TokenCredential;
pub use device_code::{DeviceCodeCredential, DeviceCodeInfo};
pub use token::{format_duration, AccessToken};
