//! obuild-lib: the obuild rule engine.
//!
//! Build definitions are Lua scripts evaluated by an embedded runtime.
//! Evaluating a definition registers rules (target, deps, optional
//! recipe); [`Engine::exec_main`] then walks the dependency graph,
//! dispatches `shell` commands to a worker pool and re-runs only the
//! recipes whose targets are out of date.
//!
//! The `obuild-cli` crate provides the `obuild` binary on top of this.

pub mod barrier;
pub mod engine;
pub mod error;
pub mod exec;
pub mod globs;
pub mod list;
pub mod lua;
pub mod pattern;
pub mod pool;
pub mod resolver;
pub mod rules;

pub use engine::{Engine, EngineOptions};
pub use error::EngineError;
