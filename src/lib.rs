// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Secure Messaging Gateway
//!
//! Bridges a secure messaging transport to per-contact conversation logs and
//! attachments kept on an encrypted volume, and exposes send/history over a
//! small HTTP API.
//!
//! ## Modules
//!
//! - `activation` - Registration and startup sequence
//! - `api` - HTTP API handlers (Axum)
//! - `listener` - Supervised inbound receive loop
//! - `relay` - Outbound and inbound message paths
//! - `storage` - Contacts, history and attachments on the encrypted volume
//! - `transport` - Messaging transport boundary and signal-cli REST client
//! - `volume` - LUKS volume unlock/lock

pub mod activation;
pub mod api;
pub mod config;
pub mod error;
pub mod listener;
pub mod models;
pub mod notify;
pub mod prompts;
pub mod relay;
pub mod state;
pub mod storage;
pub mod transport;
pub mod volume;
