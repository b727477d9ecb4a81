mod auth;
mod engine;
pub mod selectors;

pub use engine::FeedEngine;

#[cfg(test)]
pub(crate) use engine::tests as engine_test_support;
