//! Team task tracking: users with roles, a task lifecycle, recurring tasks
//! and performance reports, kept in a local store and mirrored to the cloud.

pub mod app;
pub mod cloud;
pub mod error;
pub mod model;
pub mod recurrence;
pub mod report;
pub mod store;
pub mod workflow;
