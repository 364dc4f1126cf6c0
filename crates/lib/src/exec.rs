//! The recursive rule executor.
//!
//! `exec_rule` resolves a target, walks its deps depth-first on the
//! evaluator thread and, once every task enqueued under the
//! invocation's barrier has drained, decides from file timestamps
//! whether the recipe actually runs. Recipes execute synchronously on
//! the same thread; the worker pool only ever sees `shell` tasks.

use std::rc::Rc;
use std::sync::Arc;
use std::time::SystemTime;

use mlua::prelude::*;
use mlua::RegistryKey;
use tracing::debug;

use crate::barrier::RuleBarrier;
use crate::engine::EngineState;
use crate::error::{EngineError, Result};
use crate::list;
use crate::pattern;
use crate::resolver::{self, SubRule};

/// One matched rule with everything exec needs copied out of the
/// registry, so no registry borrow is held while Lua runs.
struct ResolvedRule {
  sub: String,
  deps: Vec<String>,
  recipe: Option<Rc<RegistryKey>>,
  action: bool,
}

/// Drive one target to completion and return its integer result.
pub(crate) fn exec_rule(
  lua: &Lua,
  st: &Rc<EngineState>,
  target: &str,
  from: Option<&str>,
) -> Result<i32> {
  let subrules = resolve_cached(st, target)?;
  let rlist: Vec<ResolvedRule> = {
    let rules = st.rules.borrow();
    subrules
      .iter()
      .map(|sr| {
        let rule = rules.get(sr.rule);
        ResolvedRule {
          sub: sr.sub.clone(),
          deps: rule.deps.clone(),
          recipe: rule.recipe.clone(),
          action: rule.action,
        }
      })
      .collect()
  };

  // a lone action match runs unconditionally: no dep walk, no
  // timestamp check
  if let [only] = rlist.as_slice()
    && only.action
  {
    debug!("running action '{target}'");
    return match &only.recipe {
      Some(key) => call_recipe(lua, key),
      None => Ok(0),
    };
  }

  if rlist.is_empty() && !check_file(target) {
    return Err(missing_rule(target, from));
  }
  exec_func(lua, st, target, &rlist, from)
}

/// Walk deps under a fresh barrier, then run the chosen recipe if the
/// target is an action or out of date.
fn exec_func(
  lua: &Lua,
  st: &Rc<EngineState>,
  target: &str,
  rlist: &[ResolvedRule],
  from: Option<&str>,
) -> Result<i32> {
  let mut subdeps = Vec::new();
  let code = wait_result(st, || exec_list(lua, st, rlist, &mut subdeps, target))?;
  if code != 0 {
    return Ok(code);
  }

  // the resolver guarantees at most one recipe in the list
  let chosen = rlist
    .iter()
    .find_map(|r| r.recipe.as_ref().map(|key| (key, r.action)));
  match chosen {
    Some((key, action)) => {
      if action || check_exec(target, &subdeps) {
        debug!("running recipe for '{target}'");
        run_recipe(lua, key, target, &subdeps)
      } else {
        debug!("'{target}' is up to date");
        Ok(0)
      }
    }
    None => {
      // deps are satisfied but nothing can produce the file itself;
      // a present-but-stale target is tolerated, a missing one is not
      if check_file(target) {
        Ok(0)
      } else {
        Err(missing_rule(target, from))
      }
    }
  }
}

/// Expand and recurse into every declared dep, in declaration order,
/// collecting the concrete dep names (duplicates preserved).
fn exec_list(
  lua: &Lua,
  st: &Rc<EngineState>,
  rlist: &[ResolvedRule],
  subdeps: &mut Vec<String>,
  target: &str,
) -> Result<i32> {
  for sr in rlist {
    for dep in &sr.deps {
      let dep = pattern::expand(dep, &sr.sub);
      subdeps.push(dep.clone());
      let code = exec_rule(lua, st, &dep, Some(target))?;
      if code != 0 {
        return Ok(code);
      }
    }
  }
  Ok(0)
}

/// Push a fresh barrier, run `f`, then block until every task enqueued
/// under the barrier has drained. The first non-zero of (`f`'s code,
/// the barrier result) wins; the drain happens even when `f` errors,
/// so callers always observe quiescence.
pub(crate) fn wait_result<F>(st: &Rc<EngineState>, f: F) -> Result<i32>
where
  F: FnOnce() -> Result<i32>,
{
  let barrier = Arc::new(RuleBarrier::new());
  st.counters.borrow_mut().push(Arc::clone(&barrier));
  let ret = f();
  st.counters.borrow_mut().pop();
  barrier.wait();
  match ret {
    Err(err) => Err(err),
    Ok(code) if code != 0 => Ok(code),
    Ok(_) => Ok(barrier.result()),
  }
}

fn resolve_cached(st: &Rc<EngineState>, target: &str) -> Result<Rc<Vec<SubRule>>> {
  if let Some(hit) = st.cache.borrow().get(target) {
    return Ok(Rc::clone(hit));
  }
  let resolved = Rc::new(resolver::find_rules(&st.rules.borrow(), target)?);
  st.cache
    .borrow_mut()
    .insert(target.to_string(), Rc::clone(&resolved));
  Ok(resolved)
}

fn missing_rule(target: &str, from: Option<&str>) -> EngineError {
  match from {
    None => EngineError::MissingRule(target.to_string()),
    Some(from) => EngineError::MissingRuleFor {
      target: target.to_string(),
      from: from.to_string(),
    },
  }
}

/// Bind the recipe aliases, invoke the body and restore the previous
/// globals on every exit path.
fn run_recipe(lua: &Lua, key: &RegistryKey, target: &str, subdeps: &[String]) -> Result<i32> {
  let globals = lua.globals();
  let saved_target: LuaValue = globals.get("target").map_err(|_| EngineError::Alias("target"))?;
  let saved_source: LuaValue = globals.get("source").map_err(|_| EngineError::Alias("source"))?;
  let saved_sources: LuaValue =
    globals.get("sources").map_err(|_| EngineError::Alias("sources"))?;

  let bind = || -> Result<()> {
    globals
      .set("target", target)
      .map_err(|_| EngineError::Alias("target"))?;
    if let Some(first) = subdeps.first() {
      globals
        .set("source", first.as_str())
        .map_err(|_| EngineError::Alias("source"))?;
      globals
        .set("sources", list::join(subdeps))
        .map_err(|_| EngineError::Alias("sources"))?;
    }
    Ok(())
  };
  let ret = bind().and_then(|_| call_recipe(lua, key));

  let _ = globals.set("target", saved_target);
  let _ = globals.set("source", saved_source);
  let _ = globals.set("sources", saved_sources);
  ret
}

/// Fetch a recipe body back out of the registry and run it. A recipe
/// that returns nothing yields 0.
fn call_recipe(lua: &Lua, key: &RegistryKey) -> Result<i32> {
  let func: LuaFunction = lua.registry_value(key)?;
  let ret: Option<i64> = func.call(())?;
  Ok(ret.unwrap_or(0) as i32)
}

/// Whether `target` must be (re)built: it is missing, a dep is
/// missing, or a dep is newer.
pub(crate) fn check_exec(target: &str, deps: &[String]) -> bool {
  !check_file(target) || deps.iter().any(|dep| !check_file(dep)) || check_ts(target, deps)
}

pub(crate) fn check_file(path: &str) -> bool {
  std::fs::File::open(path).is_ok()
}

fn check_ts(target: &str, deps: &[String]) -> bool {
  let Some(tts) = file_mtime(target) else {
    return true;
  };
  deps
    .iter()
    .any(|dep| file_mtime(dep).is_some_and(|sts| tts < sts))
}

/// Modification time of a regular file; anything else counts as
/// missing.
fn file_mtime(path: &str) -> Option<SystemTime> {
  let md = std::fs::metadata(path).ok()?;
  if !md.is_file() {
    return None;
  }
  md.modified().ok()
}
