//! # ragbot core
//!
//! I/O-free logic shared by the ragbot front ends: the data model, the
//! overlapping-window chunker, the embedding and vector-store traits (with
//! an in-memory store), the retriever, and the agent graph that drives a
//! single chat turn.
//!
//! Nothing in this crate touches the filesystem or the network. Concrete
//! clients (SQLite store, OpenAI models, scrapers) live in the `ragbot`
//! application crate and are injected through the traits defined here.

pub mod agent;
pub mod chunk;
pub mod embedding;
pub mod error;
pub mod models;
pub mod retrieve;
pub mod store;
