//! Deployment placeholder. Some hosting platforms expect a non-empty
//! `deps/` directory of installable packages; this crate satisfies that and
//! has no behavior of its own.
