//! Warmgate: a prefix-routing API gateway for backends that sleep when idle.
//!
//! Requests are matched to a backend by URL prefix, the backend is woken with
//! a probe, and the call is retried once when it answers with a cold-start
//! status. A background scheduler pings every backend so they stay warm.

pub mod cli;
pub mod config;
pub mod constants;
pub mod error;
pub mod health;
pub mod keepalive;
pub mod logging;
pub mod prober;
pub mod proxy;
pub mod retry;
pub mod server;
pub mod upstream;
