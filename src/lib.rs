//! A TCP relay that bridges address families: clients connect over one,
//! the target is dialed over the other.

#[macro_use]
extern crate tracing;

#[macro_use]
mod display;

pub mod app;
pub mod config;
pub mod net;
pub mod pidfile;
pub mod relay;
pub mod signal;
