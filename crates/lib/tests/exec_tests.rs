//! End-to-end engine scenarios: definition scripts evaluated by the
//! real Lua runtime against real files in a tempdir.
//!
//! All paths are absolute so the suite never touches the process cwd;
//! cwd-relative behaviour is covered by the CLI tests.

use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};

use obuild_lib::{Engine, EngineOptions};
use tempfile::TempDir;

fn engine(jobs: usize) -> Engine {
  Engine::new(EngineOptions { jobs, ignore_env: false }).unwrap()
}

/// Create a file `age_secs` in the past.
fn touch_aged(dir: &Path, name: &str, age_secs: u64) {
  let path = dir.join(name);
  fs::write(&path, "").unwrap();
  let file = fs::OpenOptions::new().write(true).open(&path).unwrap();
  file
    .set_modified(SystemTime::now() - Duration::from_secs(age_secs))
    .unwrap();
}

fn read_log(dir: &Path) -> Vec<String> {
  match fs::read_to_string(dir.join("log")) {
    Ok(s) => s.lines().map(str::to_string).collect(),
    Err(_) => Vec::new(),
  }
}

#[test]
fn up_to_date_target_without_recipe_is_missing() {
  // deps are satisfied, but nothing can produce the absent `test`
  let tmp = TempDir::new().unwrap();
  let d = tmp.path().display();
  touch_aged(tmp.path(), "foo.c", 100);
  touch_aged(tmp.path(), "foo.o", 10);

  let e = engine(1);
  e.eval_str(&format!(
    r#"
    rule("{d}/test", "{d}/foo.o")
    rule("{d}/%.o", "{d}/%.c", function() shell("touch " .. target) end)
    "#
  ))
  .unwrap();

  let err = e.exec_main(&format!("{d}/test")).unwrap_err();
  assert!(err.to_string().contains("no rule to run target"));
  assert!(err.to_string().contains("/test"));
}

#[test]
fn rebuild_cascade_runs_both_recipes_in_order() {
  let tmp = TempDir::new().unwrap();
  let d = tmp.path().display();
  touch_aged(tmp.path(), "foo.c", 10);
  touch_aged(tmp.path(), "foo.o", 100);
  touch_aged(tmp.path(), "test", 200);

  let e = engine(2);
  e.eval_str(&format!(
    r#"
    rule("{d}/test", "{d}/foo.o", function()
      shell("echo link >> {d}/log && touch " .. target)
    end)
    rule("{d}/%.o", "{d}/%.c", function()
      shell("echo compile >> {d}/log && touch " .. target)
    end)
    "#
  ))
  .unwrap();

  assert_eq!(e.exec_main(&format!("{d}/test")).unwrap(), 0);
  // the dep's task drains before the parent recipe is enqueued
  assert_eq!(read_log(tmp.path()), vec!["compile", "link"]);
}

#[test]
fn up_to_date_tree_enqueues_nothing() {
  let tmp = TempDir::new().unwrap();
  let d = tmp.path().display();
  touch_aged(tmp.path(), "foo.c", 10);

  let e = engine(2);
  e.eval_str(&format!(
    r#"
    rule("{d}/test", "{d}/foo.o", function()
      shell("echo link >> {d}/log && touch " .. target)
    end)
    rule("{d}/%.o", "{d}/%.c", function()
      shell("echo compile >> {d}/log && touch " .. target)
    end)
    "#
  ))
  .unwrap();

  assert_eq!(e.exec_main(&format!("{d}/test")).unwrap(), 0);
  assert_eq!(read_log(tmp.path()).len(), 2);

  // everything is fresh now; a second pass runs no recipe
  let e2 = engine(2);
  e2.eval_str(&format!(
    r#"
    rule("{d}/test", "{d}/foo.o", function()
      shell("echo link >> {d}/log && touch " .. target)
    end)
    rule("{d}/%.o", "{d}/%.c", function()
      shell("echo compile >> {d}/log && touch " .. target)
    end)
    "#
  ))
  .unwrap();
  assert_eq!(e2.exec_main(&format!("{d}/test")).unwrap(), 0);
  assert_eq!(read_log(tmp.path()).len(), 2);
}

#[test]
fn shortest_capture_selects_the_recipe() {
  let tmp = TempDir::new().unwrap();
  let d = tmp.path().display();
  touch_aged(tmp.path(), "foo_x.c", 10);

  let e = engine(1);
  e.eval_str(&format!(
    r#"
    rule("{d}/%.o", "{d}/%.c", function() shell("echo A >> {d}/log") end)
    rule("{d}/foo%.o", "{d}/foo%.c", function() shell("echo B >> {d}/log") end)
    "#
  ))
  .unwrap();

  assert_eq!(e.exec_main(&format!("{d}/foo_x.o")).unwrap(), 0);
  assert_eq!(read_log(tmp.path()), vec!["B"]);
}

#[test]
fn action_runs_regardless_of_file_state() {
  let tmp = TempDir::new().unwrap();
  let d = tmp.path().display();
  touch_aged(tmp.path(), "foo.o", 10);

  let e = engine(1);
  e.eval_str(&format!(
    r#"action("clean", function() shell("rm -f {d}/foo.o") end)"#
  ))
  .unwrap();

  assert_eq!(e.exec_main("clean").unwrap(), 0);
  assert!(!tmp.path().join("foo.o").exists());

  // re-running is fine: actions never consult timestamps
  assert_eq!(e.exec_main("clean").unwrap(), 0);
}

#[test]
fn action_deps_still_drive_the_walk() {
  let tmp = TempDir::new().unwrap();
  let d = tmp.path().display();

  // the dep-only rule comes first: rules declared after a chosen
  // exact recipe no longer contribute
  let e = engine(1);
  e.eval_str(&format!(
    r#"
    depend("deploy", "{d}/prog")
    action("deploy", function() shell("touch {d}/deployed") end)
    rule("{d}/prog", "", function() shell("touch " .. target) end)
    "#
  ))
  .unwrap();

  assert_eq!(e.exec_main("deploy").unwrap(), 0);
  assert!(tmp.path().join("prog").exists());
  assert!(tmp.path().join("deployed").exists());
}

#[test]
fn parallel_failure_is_latched_and_recipe_skipped() {
  let tmp = TempDir::new().unwrap();
  let d = tmp.path().display();
  for name in ["a.c", "b.c", "c.c"] {
    touch_aged(tmp.path(), name, 10);
  }

  let e = engine(3);
  e.eval_str(&format!(
    r#"
    rule("{d}/all", "{d}/a.o {d}/b.o {d}/c.o", function()
      shell("echo aggregated >> {d}/log")
    end)
    rule("{d}/%.o", "{d}/%.c", function()
      if target == "{d}/b.o" then
        shell("false")
      else
        shell("touch " .. target)
      end
    end)
    "#
  ))
  .unwrap();

  assert_eq!(e.exec_main(&format!("{d}/all")).unwrap(), 1);
  // the other compile tasks still ran to completion
  assert!(tmp.path().join("a.o").exists());
  assert!(tmp.path().join("c.o").exists());
  // the aggregation recipe never ran
  assert!(read_log(tmp.path()).is_empty());
}

#[test]
fn source_and_sources_aliases_are_bound_and_released() {
  let tmp = TempDir::new().unwrap();
  let d = tmp.path().display();
  touch_aged(tmp.path(), "a.c", 10);
  touch_aged(tmp.path(), "b.c", 10);

  let e = engine(1);
  e.eval_str(&format!(
    r#"
    sources = "untouched"
    rule("{d}/out", "{d}/a.c {d}/b.c", function()
      shell("echo " .. source .. " >> {d}/log")
      shell("echo " .. sources .. " >> {d}/log")
    end)
    "#
  ))
  .unwrap();

  assert_eq!(e.exec_main(&format!("{d}/out")).unwrap(), 0);
  let log = read_log(tmp.path());
  assert_eq!(log[0], format!("{d}/a.c"));
  assert_eq!(log[1], format!("{d}/a.c {d}/b.c"));
  // the previous global is back after the recipe returns
  e.eval_str(r#"assert(sources == "untouched")"#).unwrap();
}

#[test]
fn invoke_drives_a_sub_target_from_a_recipe() {
  let tmp = TempDir::new().unwrap();
  let d = tmp.path().display();

  let e = engine(1);
  e.eval_str(&format!(
    r#"
    action("default", function()
      local r = invoke("{d}/out")
      assert(r == 0)
    end)
    rule("{d}/out", "", function() shell("touch " .. target) end)
    "#
  ))
  .unwrap();

  assert_eq!(e.exec_main("default").unwrap(), 0);
  assert!(tmp.path().join("out").exists());
}

#[test]
fn recipe_return_value_propagates() {
  let e = engine(1);
  e.eval_str(r#"action("failing", function() return 3 end)"#).unwrap();
  assert_eq!(e.exec_main("failing").unwrap(), 3);
}

#[test]
fn dep_only_rule_adds_deps_to_a_pattern_recipe() {
  let tmp = TempDir::new().unwrap();
  let d = tmp.path().display();
  touch_aged(tmp.path(), "foo.c", 100);
  touch_aged(tmp.path(), "extra.h", 5);
  touch_aged(tmp.path(), "foo.o", 50);

  let e = engine(1);
  e.eval_str(&format!(
    r#"
    depend("{d}/foo.o", "{d}/extra.h")
    rule("{d}/%.o", "{d}/%.c", function()
      shell("echo rebuilt >> {d}/log && touch " .. target)
    end)
    "#
  ))
  .unwrap();

  // foo.o is newer than foo.c but older than extra.h
  assert_eq!(e.exec_main(&format!("{d}/foo.o")).unwrap(), 0);
  assert_eq!(read_log(tmp.path()), vec!["rebuilt"]);
}
