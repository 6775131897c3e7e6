//! Account and session service for the VidHub platform.
//!
//! Registration, login/logout, refresh-token rotation, password change,
//! and profile updates over Postgres, with images stored on an external
//! media host.

pub mod auth;
pub mod cookies;
pub mod errors;
pub mod media;
pub mod password;
pub mod routes;
pub mod session;
pub mod state;
pub mod user;
