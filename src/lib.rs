// Copyright 2026 coursedl contributors
// SPDX-License-Identifier: MIT

//! coursedl library — authenticated session handling and syllabus
//! extraction for class.coursera.org courses.
//!
//! The binary in `main.rs` is a thin shell: everything with behavior
//! lives here so the integration tests can drive it directly.

pub mod auth;
pub mod client;
pub mod cookies;
pub mod define;
pub mod error;
pub mod resolver;
pub mod syllabus;
pub mod utils;
