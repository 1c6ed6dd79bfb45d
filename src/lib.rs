//! Client for the line-oriented control protocol of a playback service.
//!
//! The service is controlled over a persistent socket with a strict
//! request/response protocol. [`client::Client`] serializes all requests
//! through one background thread and keeps a cached copy of the service's
//! state, so that consumers such as a UI thread can read it without ever
//! blocking on the network.
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

#[macro_use]
extern crate log;

pub mod client;
pub mod config;
pub mod error;
pub mod protocol;
pub mod request;
pub mod state;
pub mod transport;
