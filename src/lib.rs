#![cfg_attr(not(doctest), doc = include_str!("../README.md"))]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub use clap_complete;
pub use k8s_openapi;
pub use kube;

pub mod claputil;
pub use claputil::{context_value_completer, kind_value_completer};
pub mod client;
pub use client::Client;
pub mod config;
pub use config::{ConnectOptions, Connection, connect, determine_context};
pub mod discover;
pub use discover::{GroupVersionFact, Operation};
pub mod dynamic;
pub use dynamic::{DynamicList, DynamicObject};
pub mod error;
pub use error::{Error, Result};
pub mod paginate;
pub use paginate::{Paginator, paginate};
pub mod registry;
pub use registry::{ResourceDescriptor, ResourceRegistry};
pub mod request;
pub use request::RequestBuilder;
pub mod retry;
pub mod selector;
pub use selector::Selector;
pub mod transport;
pub use transport::Transport;
pub mod version;
pub use version::compare_versions;

#[cfg(test)]
mod testing;
