//! Integration tests for stepcrawl
//!
//! These tests use wiremock to create mock HTTP servers and exercise the
//! fetcher classification and a full engine run end-to-end.

mod engine_tests;
mod fetcher_tests;
