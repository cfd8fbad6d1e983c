//! Publish forwarding to backend HTTP services

pub mod client;
pub mod forwarder;
pub mod resolver;
pub mod template;

pub use client::{HttpClient, PublishRequest, ReqwestClient};
pub use forwarder::{PublishForwarder, PublishOutcome};
pub use resolver::{AddrResolver, DefaultResolver};
