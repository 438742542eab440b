//! Request extractors.

mod auth;
