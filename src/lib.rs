pub mod config;
pub mod diagnostics;
pub mod documents;
pub mod embed;
pub mod enumeration;
pub mod errors;
pub mod fetch;
pub mod links;
pub mod pipeline;
pub mod project;
pub mod resolution;
pub mod tree;
pub mod types;
