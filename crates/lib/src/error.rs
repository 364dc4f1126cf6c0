//! Engine error taxonomy.

use thiserror::Error;

/// Errors raised by the rule engine.
///
/// Non-zero recipe and shell results are not errors; they propagate as
/// integer codes through the executor. Everything that aborts a run
/// outright lands here.
#[derive(Debug, Error)]
pub enum EngineError {
  /// Lua evaluation failed: a bad definition file, a recipe that
  /// threw, or a command rejecting its arguments.
  #[error("lua error: {0}")]
  Lua(#[from] mlua::Error),

  /// Two equally-ranked recipe rules matched one target.
  #[error("redefinition of rule '{0}'")]
  Redefinition(String),

  /// A target has no rule able to produce it and no file on disk.
  #[error("no rule to run target '{0}'")]
  MissingRule(String),

  /// Same as [`EngineError::MissingRule`], with the requesting target.
  #[error("no rule to run target '{target}' (needed by '{from}')")]
  MissingRuleFor { target: String, from: String },

  /// The runtime refused to bind a recipe alias; internal error.
  #[error("failed binding alias '{0}'")]
  Alias(&'static str),

  /// A rule target carried more than one `%` wildcard.
  #[error("multiple '%' wildcards in rule target '{0}'")]
  MultiWildcard(String),

  /// An action was declared with a `%` in its name.
  #[error("action name '{0}' cannot contain a '%' wildcard")]
  WildcardAction(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
