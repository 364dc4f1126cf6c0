//! Filesystem `*` globbing for the `glob` script command.
//!
//! Each list token expands independently: the segment holding the
//! first `*` is matched against one directory's entries, deeper path
//! segments either recurse (when they contain another `*`) or are
//! probed as concrete files. A token that matches nothing is passed
//! through verbatim.

use crate::list;

/// Expand every token and join the results back into a list string.
pub fn expand_globs<S: AsRef<str>>(tokens: &[S]) -> String {
  let mut out = Vec::new();
  for token in tokens {
    expand_glob(&mut out, token.as_ref(), false);
  }
  list::join(&out)
}

#[derive(Clone, Copy)]
enum Part<'a> {
  Lit(&'a str),
  Any,
}

/// Expand one token into `out`. Returns whether anything on disk
/// matched. With `quiet` (used for recursive descent) an unmatched
/// token contributes nothing instead of falling back to itself.
fn expand_glob(out: &mut Vec<String>, src: &str, quiet: bool) -> bool {
  let Some(star) = src.find('*') else {
    if !quiet {
      out.push(src.to_string());
    }
    return false;
  };

  // the directory to scan is everything up to the last '/' before the
  // first '*'; the filename segment runs from there to the next '/'
  let prestar = &src[..star];
  let (dir, seg_start) = match prestar.rfind('/') {
    Some(i) => (&src[..i], i + 1),
    None => (".", 0),
  };
  let rest = &src[star + 1..];
  let (seg_end, deeper) = match rest.find('/') {
    Some(i) => (star + 1 + i, Some(&rest[i..])),
    None => (src.len(), None),
  };
  let parts = segment_parts(&src[seg_start..seg_end]);

  if expand_dir(out, dir, &parts, deeper) {
    true
  } else {
    if !quiet {
      out.push(src.to_string());
    }
    false
  }
}

/// Scan `dir` and collect entries matching `parts`, descending into
/// `deeper` path segments where present.
fn expand_dir(out: &mut Vec<String>, dir: &str, parts: &[Part], deeper: Option<&str>) -> bool {
  let Ok(entries) = std::fs::read_dir(dir) else {
    return false;
  };
  let mut appended = false;
  for entry in entries.flatten() {
    let name = entry.file_name();
    let Some(name) = name.to_str() else {
      continue;
    };
    if !path_matches(name, parts) {
      continue;
    }
    let path = if dir == "." {
      name.to_string()
    } else {
      format!("{dir}/{name}")
    };
    match deeper {
      Some(deeper) => {
        let full = format!("{path}{deeper}");
        if deeper[1..].contains('*') {
          if expand_glob(out, &full, true) {
            appended = true;
          }
        } else if readable(&full) {
          out.push(full);
          appended = true;
        }
      }
      None => {
        out.push(path);
        appended = true;
      }
    }
  }
  appended
}

/// Chop one filename segment into alternating literal and `*` parts.
fn segment_parts(mut seg: &str) -> Vec<Part<'_>> {
  let mut parts = Vec::new();
  while let Some(pos) = seg.find('*') {
    if pos > 0 {
      parts.push(Part::Lit(&seg[..pos]));
    }
    parts.push(Part::Any);
    seg = &seg[pos + 1..];
  }
  if !seg.is_empty() {
    parts.push(Part::Lit(seg));
  }
  parts
}

/// Match an entry name against the chopped segment. A `*` consumes the
/// shortest span that lets the next literal match (possibly nothing);
/// a trailing `*` matches the rest of the name.
fn path_matches(name: &str, parts: &[Part]) -> bool {
  let mut n = name;
  let mut i = 0;
  while i < parts.len() {
    if matches!(parts[i], Part::Any) {
      i += 1;
      while i < parts.len() && matches!(parts[i], Part::Any) {
        i += 1;
      }
      if i == parts.len() {
        return true;
      }
      let Part::Lit(lit) = parts[i] else { unreachable!() };
      while n.len() > lit.len() && !n.starts_with(lit) {
        let mut chars = n.chars();
        chars.next();
        n = chars.as_str();
      }
    }
    let Part::Lit(lit) = parts[i] else { unreachable!() };
    if n.len() < lit.len() || !n.starts_with(lit) {
      return false;
    }
    n = &n[lit.len()..];
    i += 1;
  }
  n.is_empty()
}

fn readable(path: &str) -> bool {
  std::fs::File::open(path).is_ok()
}
