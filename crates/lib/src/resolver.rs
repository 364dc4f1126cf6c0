//! Target resolution.
//!
//! Maps a concrete target name onto the rules that apply to it. Exact
//! matches and `%` pattern matches both contribute their deps, but at
//! most one matched rule may supply the recipe: an exact recipe beats
//! any pattern, and between pattern recipes the shortest capture wins.
//! Equally-ranked recipes are a redefinition error.

use tracing::trace;

use crate::error::{EngineError, Result};
use crate::pattern;
use crate::rules::RuleSet;

/// A resolved match: a stable index into the rule sequence plus the
/// substring the `%` captured (empty for exact matches).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubRule {
  pub rule: usize,
  pub sub: String,
}

/// Scan the rule sequence in declaration order and collect the matches
/// for `target`.
///
/// Recipe-less rules are kept for their dependency contributions; they
/// stop being collected once an exact recipe has been chosen. When a
/// recipe rule displaces a weaker recipe rule, the loser leaves the
/// result list entirely.
pub fn find_rules(rules: &RuleSet, target: &str) -> Result<Vec<SubRule>> {
  let mut list: Vec<SubRule> = Vec::new();
  // position in `list` of the recipe-bearing candidate, if any
  let mut chosen: Option<usize> = None;
  let mut exact = false;

  for (idx, rule) in rules.iter().enumerate() {
    if rule.target == target {
      if rule.recipe.is_some() {
        if exact {
          return Err(EngineError::Redefinition(target.to_string()));
        }
        if let Some(ci) = chosen.take() {
          list.remove(ci);
        }
        exact = true;
        list.push(SubRule { rule: idx, sub: String::new() });
        chosen = Some(list.len() - 1);
      } else if !exact {
        list.push(SubRule { rule: idx, sub: String::new() });
      }
      continue;
    }
    if exact {
      continue;
    }
    let Some(sub) = pattern::compare_subst(target, &rule.target) else {
      continue;
    };
    if rule.recipe.is_none() {
      list.push(SubRule { rule: idx, sub: sub.to_string() });
      continue;
    }
    match chosen {
      None => {
        list.push(SubRule { rule: idx, sub: sub.to_string() });
        chosen = Some(list.len() - 1);
      }
      Some(ci) => {
        let current = list[ci].sub.len();
        if sub.len() == current {
          return Err(EngineError::Redefinition(target.to_string()));
        }
        if sub.len() < current {
          list.remove(ci);
          list.push(SubRule { rule: idx, sub: sub.to_string() });
          chosen = Some(list.len() - 1);
        }
        // longer capture: the candidate we already hold stays
      }
    }
  }

  trace!("resolved {} match(es) for '{}'", list.len(), target);
  Ok(list)
}
