//! Client that distributes a wordlist to brute-force workers through a message broker.
//!
//! Every non-empty line of the wordlist is published to the run's publish queue. Workers reply on
//! the retrieve queue with a JSON result per item, which the [`retriever`] classifies into hits
//! and rejects buffered in [`waitqueue::Queue`]s, and the [`report`] drains.

#[macro_use]
extern crate tracing;

pub mod broker;
pub mod config;
pub mod error;
pub mod publisher;
pub mod report;
pub mod retriever;
pub mod stats;
pub mod util;
pub mod wordlist;

mod client;

pub use crate::{
    client::{run, run_with},
    error::{Error, Result},
};
