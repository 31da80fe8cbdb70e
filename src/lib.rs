//! Crowdpix: event photo sharing with row and column level access control.
//!
//! Users create events, upload photos, and look for photos of themselves via
//! face matches. Everything sensitive in that flow funnels through the
//! authorization core in this crate:
//!
//! - [`auth`] resolves a caller's role once and evaluates pure policy
//!   predicates against it, plus the shared biometric redaction helpers.
//! - [`db`] stores profiles, events, photos, face matches, and the
//!   append-only activity log, applying the row and column rules on every
//!   read and write.
//!
//! Face detection itself happens upstream; this crate only guards the data.

pub mod auth;
pub mod config;
pub mod db;
pub mod logging;
