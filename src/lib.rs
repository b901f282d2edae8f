//! Read-only HTTP file server with conditional and partial content delivery
//!
//! The crate is split into the protocol layer ([`http`]: ranges, validators,
//! multipart encoding, bodies), request handling ([`handler`]), and the
//! server shell ([`config`], [`logger`], [`server`]).

pub mod config;
pub mod error;
pub mod handler;
pub mod http;
pub mod logger;
pub mod server;

pub use error::{Result, ServeError};
