// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agentdesk: client-side session lifecycle for the agentdesk API.
//!
//! The [`manager::SessionManager`] owns the signed-in user's token pair and
//! profile, persists the pair in a [`store::TokenStore`], and injects the
//! current access token into every request made through the shared
//! [`http::ApiClient`].

pub mod command;
pub mod config;
pub mod error;
pub mod http;
pub mod identity;
pub mod manager;
pub mod profile;
pub mod session;
pub mod store;

#[cfg(test)]
mod test_support;
