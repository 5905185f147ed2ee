//! Shared helpers for the integration tests.
//!
//! `mocks` stands in for the backend so cache and queue behavior can be
//! driven under paused time; `backend_http` talks to a wiremock server
//! instead.

pub mod fixtures;
