//! # mailbooster-oauth
//!
//! `OAuth2` bearer tokens for SMTP XOAUTH2 authentication.
//!
//! ## Features
//!
//! - **Token providers**: the [`TokenProvider`] capability the SMTP session
//!   calls during XOAUTH2, with static and refresh-token implementations
//! - **Token management**: expiry tracking with a 60 second refresh window
//! - **Provider presets**: Google and Microsoft token endpoints
//! - **SASL responses**: PLAIN, XOAUTH2 and OAUTHBEARER initial responses
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailbooster_oauth::{OAuthClient, Provider, RefreshTokenProvider, TokenProvider};
//!
//! let client = OAuthClient::new("client-id", Provider::google()?)
//!     .with_client_secret("client-secret");
//! let tokens = RefreshTokenProvider::new(client, "1//refresh-token");
//!
//! let access_token = tokens.bearer_token("user@gmail.com").await?;
//! let initial = mailbooster_oauth::sasl::xoauth2_response("user@gmail.com", &access_token);
//! // Send: AUTH XOAUTH2 {initial}
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod client;
mod error;
pub mod provider;
pub mod sasl;
pub mod token;
mod token_provider;

pub use client::OAuthClient;
pub use error::{Error, Result};
pub use provider::Provider;
pub use token::Token;
pub use token_provider::{RefreshTokenProvider, StaticTokenProvider, TokenProvider};
