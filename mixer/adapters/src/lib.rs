#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

//! Reference adapter implementations.

pub mod denier;
pub mod list;
pub mod logger;

use linkerd_mixer_core::adapter::{Builder, Registry};
use std::sync::Arc;

/// Every builder provided by this crate.
pub fn inventory() -> Registry {
    Registry::new([
        Arc::new(denier::Denier::new()) as Arc<dyn Builder>,
        Arc::new(list::List::new()),
        Arc::new(logger::Logger::new()),
    ])
}
