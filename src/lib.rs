//! GitLab merge request reviewer bot
//!
//! Receives merge request webhooks from GitLab, picks reviewers at random
//! from the suggested approvers whose Slack status shows them available,
//! writes them back to the merge request and announces the choice in the
//! team's Slack channel.

pub mod app_state;
pub mod config;
pub mod models;
pub mod routes;
pub mod services;
