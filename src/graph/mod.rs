//! Microsoft Graph client and models.

pub mod client;
pub mod models;

pub use client::{DriveTarget, GraphClient};
pub use models::{DriveItem, NewDriveItem, Page, User};
