//! The rule registry.
//!
//! Rules are registered while the definition file evaluates and are
//! never mutated afterwards; the registry is append-only, so stable
//! indices into it stay valid for the process lifetime. Recipe bodies
//! are Lua functions parked in the runtime registry and shared between
//! cloned rules as `Rc<RegistryKey>`.

use std::rc::Rc;

use mlua::RegistryKey;

use crate::error::{EngineError, Result};
use crate::list;

/// One declared rule: a target name, its ordered deps and an optional
/// recipe. Actions are named entry points that always run.
pub struct Rule {
  pub target: String,
  pub deps: Vec<String>,
  pub recipe: Option<Rc<RegistryKey>>,
  pub action: bool,
}

/// Append-only collection of declared rules.
#[derive(Default)]
pub struct RuleSet {
  rules: Vec<Rule>,
}

impl RuleSet {
  /// Register one rule per token of `targets`, each with the same deps
  /// and the same optional recipe. No recipe means the rule only
  /// contributes dependencies.
  pub fn add(
    &mut self,
    targets: &str,
    deps: &str,
    recipe: Option<Rc<RegistryKey>>,
    action: bool,
  ) -> Result<()> {
    let deps = list::explode(deps);
    for target in list::explode(targets) {
      validate_target(&target, action)?;
      self.rules.push(Rule {
        target,
        deps: deps.clone(),
        recipe: recipe.clone(),
        action,
      });
    }
    Ok(())
  }

  /// Clone the first rule whose target equals `prototype` under a new
  /// name. Deps are inherited unless `deps` is given. A missing
  /// prototype is a silent no-op.
  pub fn dup(&mut self, target: &str, prototype: &str, deps: Option<&str>) -> Result<()> {
    let Some(proto) = self.rules.iter().find(|r| r.target == prototype) else {
      return Ok(());
    };
    validate_target(target, proto.action)?;
    let rule = Rule {
      target: target.to_string(),
      deps: match deps {
        Some(d) => list::explode(d),
        None => proto.deps.clone(),
      },
      recipe: proto.recipe.clone(),
      action: proto.action,
    };
    self.rules.push(rule);
    Ok(())
  }

  pub fn get(&self, idx: usize) -> &Rule {
    &self.rules[idx]
  }

  pub fn iter(&self) -> impl Iterator<Item = &Rule> {
    self.rules.iter()
  }

  pub fn len(&self) -> usize {
    self.rules.len()
  }

  pub fn is_empty(&self) -> bool {
    self.rules.is_empty()
  }
}

fn validate_target(target: &str, action: bool) -> Result<()> {
  let wildcards = target.matches('%').count();
  if wildcards > 1 {
    return Err(EngineError::MultiWildcard(target.to_string()));
  }
  if action && wildcards > 0 {
    return Err(EngineError::WildcardAction(target.to_string()));
  }
  Ok(())
}
