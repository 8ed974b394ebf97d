//! SeaORM entity definitions for the depsync database schema.

pub mod dependency;
pub mod host;
pub mod host_kind;
pub mod manifest;
pub mod prelude;
pub mod repository;
