//! The engine facade.
//!
//! [`Engine`] owns the Lua runtime and the state shared with the
//! script commands: the rule registry, the resolver cache, the barrier
//! stack and the worker pool. Construction registers the command set;
//! evaluation fills the registry; [`Engine::exec_main`] drives a
//! target under a top-level barrier.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use mlua::Lua;
use tracing::info;

use crate::barrier::RuleBarrier;
use crate::error::Result;
use crate::exec;
use crate::lua::runtime;
use crate::pool::ThreadPool;
use crate::resolver::SubRule;
use crate::rules::RuleSet;

/// Engine construction options.
pub struct EngineOptions {
  /// Worker threads for `shell` tasks, in addition to the evaluator.
  pub jobs: usize,
  /// Make `getenv` always fall back to its default.
  pub ignore_env: bool,
}

impl Default for EngineOptions {
  fn default() -> Self {
    Self { jobs: 1, ignore_env: false }
  }
}

/// State shared between the engine and the registered script commands.
///
/// Rules, cache and the barrier stack are only ever touched from the
/// evaluator thread; individual barriers and the pool are the shared
/// surfaces workers see.
pub(crate) struct EngineState {
  pub(crate) rules: RefCell<RuleSet>,
  pub(crate) cache: RefCell<HashMap<String, Rc<Vec<SubRule>>>>,
  pub(crate) counters: RefCell<Vec<Arc<RuleBarrier>>>,
  pub(crate) pool: ThreadPool,
  pub(crate) ignore_env: bool,
  pub(crate) jobs: usize,
}

/// The build engine: a Lua runtime plus the rule machinery behind it.
pub struct Engine {
  lua: Lua,
  state: Rc<EngineState>,
}

impl Engine {
  /// Build an engine, spawn its workers and register the script
  /// command set. At least one worker always exists; a pool of zero
  /// would leave barrier waits with nothing to drain them.
  pub fn new(opts: EngineOptions) -> Result<Self> {
    let jobs = opts.jobs.max(1);
    let state = Rc::new(EngineState {
      rules: RefCell::new(RuleSet::default()),
      cache: RefCell::new(HashMap::new()),
      counters: RefCell::new(Vec::new()),
      pool: ThreadPool::new(),
      ignore_env: opts.ignore_env,
      jobs,
    });
    state.pool.init(jobs);
    let lua = runtime::create_runtime(&state)?;
    Ok(Self { lua, state })
  }

  /// Evaluate an inline definition string.
  pub fn eval_str(&self, source: &str) -> Result<()> {
    self.lua.load(source).set_name("=(execute)").exec()?;
    Ok(())
  }

  /// Evaluate a definition file.
  pub fn eval_file(&self, path: &std::path::Path) -> Result<()> {
    info!("evaluating {}", path.display());
    let source = std::fs::read_to_string(path).map_err(mlua::Error::external)?;
    self
      .lua
      .load(&source)
      .set_name(format!("@{}", path.display()))
      .exec()?;
    Ok(())
  }

  /// Whether evaluation declared any rules at all.
  pub fn has_rules(&self) -> bool {
    !self.state.rules.borrow().is_empty()
  }

  /// Drive `target` under a top-level barrier and return its result
  /// once every task spawned on its behalf has completed.
  pub fn exec_main(&self, target: &str) -> Result<i32> {
    exec::wait_result(&self.state, || {
      exec::exec_rule(&self.lua, &self.state, target, None)
    })
  }

  /// Join the worker pool. Implied by drop; idempotent.
  pub fn shutdown(&self) {
    self.state.pool.destroy();
  }
}

#[cfg(test)]
mod tests {
  use crate::error::EngineError;

  use super::*;

  fn engine() -> Engine {
    Engine::new(EngineOptions::default()).unwrap()
  }

  #[test]
  fn starts_with_no_rules() {
    let e = engine();
    assert!(!e.has_rules());
  }

  #[test]
  fn eval_str_registers_rules() {
    let e = engine();
    e.eval_str("rule('a', 'b')").unwrap();
    assert!(e.has_rules());
  }

  #[test]
  fn bad_lua_is_an_eval_error() {
    let e = engine();
    let err = e.eval_str("this is not lua {{{").unwrap_err();
    assert!(matches!(err, EngineError::Lua(_)));
  }

  #[test]
  fn rule_with_multiple_wildcards_fails_eval() {
    let e = engine();
    let err = e.eval_str("rule('%.%', 'x')").unwrap_err();
    assert!(err.to_string().contains("multiple '%' wildcards"));
  }

  #[test]
  fn numcpus_and_numjobs_are_exposed() {
    let e = Engine::new(EngineOptions { jobs: 3, ignore_env: false }).unwrap();
    e.eval_str("assert(numcpus >= 1); assert(numjobs == 3)").unwrap();
  }

  #[test]
  fn shell_outside_a_build_fails_eval() {
    let e = engine();
    assert!(e.eval_str("shell('true')").is_err());
  }

  #[test]
  fn missing_rule_error_names_the_target() {
    let e = engine();
    e.eval_str("rule('a', 'b')").unwrap();
    let err = e.exec_main("nothing-declares-this").unwrap_err();
    assert_eq!(
      err.to_string(),
      "no rule to run target 'nothing-declares-this'"
    );
  }

  #[test]
  fn missing_dep_error_carries_context() {
    let e = engine();
    e.eval_str("rule('top', '/nonexistent/dep', function() end)").unwrap();
    let err = e.exec_main("top").unwrap_err();
    assert_eq!(
      err.to_string(),
      "no rule to run target '/nonexistent/dep' (needed by 'top')"
    );
  }

  #[test]
  fn redefinition_is_detected_at_resolution() {
    let e = engine();
    e.eval_str("rule('t', '', function() end) rule('t', '', function() end)")
      .unwrap();
    let err = e.exec_main("t").unwrap_err();
    assert!(matches!(err, EngineError::Redefinition(_)));
  }

  #[test]
  fn getenv_reads_the_environment() {
    let e = engine();
    // PATH is always set in a test environment
    e.eval_str("assert(getenv('PATH') ~= '')").unwrap();
    e.eval_str("assert(getenv('OBUILD_SURELY_UNSET_VAR', 'dflt') == 'dflt')")
      .unwrap();
    e.eval_str("assert(getenv('OBUILD_SURELY_UNSET_VAR') == '')").unwrap();
  }

  #[test]
  fn getenv_honours_ignore_env() {
    let e = Engine::new(EngineOptions { jobs: 1, ignore_env: true }).unwrap();
    e.eval_str("assert(getenv('PATH') == '')").unwrap();
    e.eval_str("assert(getenv('PATH', 'fallback') == 'fallback')").unwrap();
  }

  #[test]
  fn extreplace_is_wired_up() {
    let e = engine();
    e.eval_str("assert(extreplace('a.c b.c', 'c', 'o') == 'a.o b.o')").unwrap();
  }
}
