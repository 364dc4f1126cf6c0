//! The host list convention.
//!
//! Script commands exchange lists as single strings: tokens are
//! maximal runs of non-whitespace, joins use a single space. Every
//! engine surface that takes or produces a list (`rule` targets and
//! deps, `glob`, `extreplace`, the `sources` alias) round-trips
//! through this module rather than splitting ad hoc.

/// Split a list string into its tokens.
pub fn explode(list: &str) -> Vec<String> {
  list.split_whitespace().map(str::to_string).collect()
}

/// Join tokens back into a list string.
pub fn join<S: AsRef<str>>(tokens: &[S]) -> String {
  tokens
    .iter()
    .map(|t| t.as_ref())
    .collect::<Vec<_>>()
    .join(" ")
}

/// Swap the extension of every token whose suffix after the last `.`
/// equals `oldext`; other tokens pass through unchanged. A leading `.`
/// on either extension argument is ignored.
pub fn replace_ext(list: &str, oldext: &str, newext: &str) -> String {
  let oldext = oldext.strip_prefix('.').unwrap_or(oldext);
  let newext = newext.strip_prefix('.').unwrap_or(newext);
  let tokens: Vec<String> = explode(list)
    .into_iter()
    .map(|tok| match tok.rfind('.') {
      Some(i) if tok[i + 1..] == *oldext => format!("{}.{}", &tok[..i], newext),
      _ => tok,
    })
    .collect();
  join(&tokens)
}
