//! `%` pattern matching for rule targets and deps.
//!
//! A pattern target holds at most one `%`; matching a concrete name
//! against it yields the substring the `%` stood for. Deps of the
//! matched rule may splice that capture back in with [`expand`].

/// Match `expanded` against `pattern` and return the capture.
///
/// The prefix before `%` and the suffix after it must both be present
/// in `expanded` with at least one character left over for the capture
/// itself, so a `%` never matches the empty string. Patterns without a
/// `%` never match here; exact names are compared elsewhere.
pub fn compare_subst<'a>(expanded: &'a str, pattern: &str) -> Option<&'a str> {
  let pos = pattern.find('%')?;
  let (pre, rest) = pattern.split_at(pos);
  let post = &rest[1..];
  if expanded.len() <= pre.len() || !expanded.starts_with(pre) {
    return None;
  }
  let tail = &expanded[pre.len()..];
  if post.is_empty() {
    return Some(tail);
  }
  if tail.len() <= post.len() || !tail.ends_with(post) {
    return None;
  }
  Some(&tail[..tail.len() - post.len()])
}

/// Splice `capture` into the first `%` of `dep`.
///
/// Deps without a `%` pass through verbatim. Only the first `%` is
/// substituted; any later ones are kept as-is. An empty capture (the
/// rule matched exactly) removes the `%`.
pub fn expand(dep: &str, capture: &str) -> String {
  match dep.find('%') {
    Some(pos) => format!("{}{}{}", &dep[..pos], capture, &dep[pos + 1..]),
    None => dep.to_string(),
  }
}
