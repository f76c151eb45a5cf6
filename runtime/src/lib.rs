// Copyright 2026 Coursevault Contributors
// SPDX-License-Identifier: Apache-2.0

//! Coursevault runtime library: archives LMS courses by driving a browser.
//!
//! This library crate exposes the core modules for integration testing.

#![allow(clippy::new_without_default)]

pub mod archive;
pub mod auth;
pub mod cli;
pub mod config;
pub mod course;
pub mod error;
pub mod extraction;
pub mod navigation;
pub mod progress;
pub mod renderer;
pub mod selectors;
