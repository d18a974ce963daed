mod app;
mod webhook;

#[cfg(test)]
mod test_utils;

pub use app::{add_routes, SharedSink};
