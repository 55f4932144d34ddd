//! Send one prompt to many backends at once and collect every outcome.
//!
//! Backends implement [`target::BackendTarget`]. The [`engine::Engine`]
//! facade fans a prompt out across a [`target::TargetRegistry`] and returns
//! one [`engine::result::ExecutionResult`] per requested name.

pub mod banner;
pub mod commands;
pub mod config;
pub mod consts;
pub mod engine;
pub mod events;
pub mod logging;
pub mod report;
pub mod spinner;
pub mod target;
