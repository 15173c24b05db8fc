//! Terminal dashboard over the read API.
//!
//! [`poller::mount`] owns the refresh timer and hands out a
//! [`poller::DashboardHandle`]; [`render`] turns the published
//! [`state::DashboardState`] into text.

pub mod client;
pub mod poller;
pub mod render;
pub mod state;

pub use client::{DashboardApi, HttpDashboardApi};
pub use poller::{DashboardHandle, mount};
pub use state::{DashboardData, DashboardState, Phase};
