//! stackwright-server: HTTP front end for the scaffold generator.

pub mod config;
pub mod error;
pub mod server;
pub mod web;
