//! # weft-core
//!
//! Core library for the weft document preprocessor.
//!
//! This crate provides the building blocks for expanding lightweight
//! markup into HTML: a region tokenizer that separates text, code
//! blocks and inline snippets, a filter trait with a pass engine that
//! walks the token stream, and the filters themselves (includes,
//! macros, listings, titles, end notes, indexes, cross references).

pub mod attrs;
pub mod config;
pub mod context;
pub mod diag;
pub mod element;
pub mod entity;
pub mod filter;
pub mod include;
pub mod index;
pub mod listing;
pub mod macros;
pub mod notes;
pub mod pass;
pub mod pipeline;
pub mod snippet;
pub mod tags;
pub mod textutil;
pub mod titles;
pub mod token;

pub use context::Context;
pub use diag::Diagnostics;
pub use filter::{BlockKind, Filter, KindSet};
pub use pass::Pass;
pub use pipeline::Pipeline;
pub use token::{Token, TokenKind, TokenStream};
