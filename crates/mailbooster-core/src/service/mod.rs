//! Sending services.
//!
//! This module provides the layer that bridges callers with the composer
//! and SMTP libraries.

pub mod mailer;

pub use mailer::Mailer;
