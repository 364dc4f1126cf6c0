//! Lua runtime construction and the script command set.
//!
//! Definition files drive the engine through plain global functions:
//! `rule`, `action`, `depend` and `duprule` register rules, `shell`
//! enqueues work onto the pool under the current barrier, `invoke`
//! re-enters the executor, and `glob`/`extreplace`/`getenv`/`echo`
//! are list and environment helpers. The closures share the engine
//! state as `Rc<EngineState>`.

use std::process::Command;
use std::rc::Rc;
use std::sync::Arc;

use mlua::prelude::*;
use tracing::debug;

use crate::engine::EngineState;
use crate::error::Result;
use crate::exec;
use crate::globs;
use crate::list;
use crate::pool;

/// Build a Lua runtime with the full command set registered.
pub(crate) fn create_runtime(state: &Rc<EngineState>) -> Result<Lua> {
  let lua = Lua::new();
  register_commands(&lua, state)?;
  Ok(lua)
}

fn register_commands(lua: &Lua, state: &Rc<EngineState>) -> LuaResult<()> {
  let globals = lua.globals();

  // rule(targets, deps [, body]): declare rules; no body means the
  // rule only contributes dependencies
  let st = Rc::clone(state);
  globals.set(
    "rule",
    lua.create_function(
      move |lua, (targets, deps, body): (String, String, Option<LuaFunction>)| {
        let recipe = body
          .map(|f| lua.create_registry_value(f))
          .transpose()?
          .map(Rc::new);
        st.rules
          .borrow_mut()
          .add(&targets, &deps, recipe, false)
          .map_err(LuaError::external)?;
        st.cache.borrow_mut().clear();
        Ok(())
      },
    )?,
  )?;

  // action(name, body): a named entry point that always runs
  let st = Rc::clone(state);
  globals.set(
    "action",
    lua.create_function(move |lua, (name, body): (String, LuaFunction)| {
      let recipe = Rc::new(lua.create_registry_value(body)?);
      st.rules
        .borrow_mut()
        .add(&name, "", Some(recipe), true)
        .map_err(LuaError::external)?;
      st.cache.borrow_mut().clear();
      Ok(())
    })?,
  )?;

  // depend(target, deps): dependency-only rule
  let st = Rc::clone(state);
  globals.set(
    "depend",
    lua.create_function(move |_, (target, deps): (String, String)| {
      st.rules
        .borrow_mut()
        .add(&target, &deps, None, false)
        .map_err(LuaError::external)?;
      st.cache.borrow_mut().clear();
      Ok(())
    })?,
  )?;

  // duprule(new, existing [, deps]): clone a rule, inheriting deps
  // when none are given
  let st = Rc::clone(state);
  globals.set(
    "duprule",
    lua.create_function(
      move |_, (target, prototype, deps): (String, String, Option<String>)| {
        st.rules
          .borrow_mut()
          .dup(&target, &prototype, deps.as_deref())
          .map_err(LuaError::external)?;
        st.cache.borrow_mut().clear();
        Ok(())
      },
    )?,
  )?;

  // shell(cmdline): enqueue onto the pool under the current barrier
  // and return 0 immediately; the exit status is latched into the
  // barrier when the task finishes
  let st = Rc::clone(state);
  globals.set(
    "shell",
    lua.create_function(move |_, cmd: String| {
      let Some(barrier) = st.counters.borrow().last().cloned() else {
        return Err(LuaError::external("shell called outside of a build"));
      };
      let guard = barrier.enter();
      let latch = Arc::clone(&barrier);
      st.pool.push(move || {
        let _guard = guard;
        debug!(%cmd, "shell");
        let code = match Command::new("sh").arg("-c").arg(&cmd).status() {
          Ok(status) => status.code().unwrap_or(1),
          Err(_) => 127,
        };
        if code != 0 {
          latch.fail(code);
        }
      });
      Ok(0)
    })?,
  )?;

  // invoke(target): drive a sub-target from inside a recipe
  let st = Rc::clone(state);
  globals.set(
    "invoke",
    lua.create_function(move |lua, target: String| {
      exec::exec_rule(lua, &st, &target, None).map_err(LuaError::external)
    })?,
  )?;

  globals.set(
    "echo",
    lua.create_function(|_, msg: String| {
      println!("{msg}");
      Ok(())
    })?,
  )?;

  globals.set(
    "glob",
    lua.create_function(|_, lst: String| Ok(globs::expand_globs(&list::explode(&lst))))?,
  )?;

  globals.set(
    "extreplace",
    lua.create_function(|_, (lst, oldext, newext): (String, String, String)| {
      Ok(list::replace_ext(&lst, &oldext, &newext))
    })?,
  )?;

  // getenv(name [, default]): default (or "") when the variable is
  // unset, empty, or the environment is ignored
  let st = Rc::clone(state);
  globals.set(
    "getenv",
    lua.create_function(move |_, (name, default): (String, Option<String>)| {
      let default = default.unwrap_or_default();
      if st.ignore_env {
        return Ok(default);
      }
      match std::env::var(&name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Ok(default),
      }
    })?,
  )?;

  globals.set("numcpus", pool::num_cpus() as i64)?;
  globals.set("numjobs", state.jobs as i64)?;

  Ok(())
}
