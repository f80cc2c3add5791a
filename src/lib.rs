// (C) Copyright 2019-2020 Hewlett Packard Enterprise Development LP

#![forbid(unsafe_code)]

//! # Enriched syntax trees for Dockerfiles
//!
//! A pure Rust library that turns a Dockerfile into an enriched abstract
//! syntax tree (EAST): every instruction is analyzed in the context of the
//! build around it. Variable references are broken out, shell commands are
//! split into segments and recognized constructs, `COPY`/`ADD` sources are
//! resolved to the repository files they copy, and scripts run by later
//! commands are traced back to those files.
//!
//! Analysis never fails. Anything that cannot be understood is kept as plain
//! text or marked with an explicit `error` node.
//!
//! ## Quick start
//!
//! ```rust
//! use dockerfile_east::{EastOptions, EastParser};
//!
//! let parser = EastParser::new(EastOptions::new("/path/to/repo"));
//! let east = parser.parse_str(r#"
//!   ARG VERSION=3.12
//!   FROM alpine:${VERSION} as builder
//!   RUN echo "hello world" > /hello-world && chmod 644 /hello-world
//!
//!   FROM scratch
//!   COPY --from=builder /hello-world /hello-world
//! "#).unwrap();
//!
//! println!("{}", east);
//! assert_eq!(east.children().len(), 5);
//! ```

#[macro_use] extern crate pest_derive;

mod error;
mod parser;
mod span;
mod util;
mod node;
mod variables;
mod image;
mod state;
mod options;
mod files;
mod instructions;
mod dockerfile_parser;
mod east;

pub mod shell;

pub use error::*;
pub use parser::Rule;
pub use span::*;
pub use util::*;
pub use node::*;
pub use variables::*;
pub use image::*;
pub use state::*;
pub use options::*;
pub use files::*;
pub use instructions::*;
pub use crate::dockerfile_parser::*;
pub use east::*;

#[cfg(test)] mod test_util;
