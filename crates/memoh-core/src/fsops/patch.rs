//! Unified-diff apply (§4.5, hand-written per §9's design note) and unified
//! diff production (`similar::TextDiff::unified_diff`, a third-party
//! formatter with no "tolerance" concern since there's nothing to misapply).

use crate::error::CoreError;

/// Splits text into lines the way the algorithm expects: a trailing newline
/// produces a trailing empty element, preserved rather than trimmed.
fn split_lines(text: &str) -> Vec<&str> {
    text.split('\n').collect()
}

struct Hunk<'a> {
    orig_start: usize,
    lines: Vec<&'a str>,
}

fn parse_hunk_header(line: &str) -> Option<(usize, usize)> {
    let line = line.strip_prefix("@@ -")?;
    let (orig, rest) = line.split_once(' ')?;
    let rest = rest.strip_prefix('+')?;
    let (new, _) = rest.split_once(" @@")?;

    let orig_start: usize = orig.split(',').next()?.parse().ok()?;
    let new_start: usize = new.split(',').next()?.parse().ok()?;
    Some((orig_start, new_start))
}

/// `ApplyPatch`'s core algorithm: applies unified-diff patch text `patch` to
/// original text `original`, returning the patched text or a strict error.
/// No modification is visible on error — the caller only gets `Ok` output.
pub fn apply_unified_diff(original: &str, patch: &str) -> Result<String, CoreError> {
    let orig_lines = split_lines(original);
    let patch_lines: Vec<&str> = patch.split('\n').collect();

    let mut out: Vec<&str> = Vec::new();
    let mut cursor: usize = 0;
    let mut idx = 0;
    let mut found_any_hunk = false;

    while idx < patch_lines.len() {
        let line = patch_lines[idx];
        if line.is_empty() {
            idx += 1;
            continue;
        }
        if !line.starts_with("@@") {
            // Before the first hunk this is a `---`/`+++` file header line
            // (or any other preamble `similar`'s formatter emits); skip it
            // and keep scanning for the first hunk header per §4.5 step 1.
            if !found_any_hunk {
                idx += 1;
                continue;
            }
            return Err(CoreError::invalid_argument(format!("invalid hunk header: {line}")));
        }
        let (orig_start, _new_start) = parse_hunk_header(line)
            .ok_or_else(|| CoreError::invalid_argument(format!("invalid hunk header: {line}")))?;
        found_any_hunk = true;
        idx += 1;

        let cursor_target = orig_start.saturating_sub(1);
        if cursor_target > orig_lines.len() {
            return Err(CoreError::invalid_argument("patch out of range"));
        }
        out.extend_from_slice(&orig_lines[cursor..cursor_target]);
        cursor = cursor_target;

        loop {
            if idx >= patch_lines.len() {
                break;
            }
            let body = patch_lines[idx];
            if body.starts_with("@@") {
                break;
            }
            if body.is_empty() {
                if idx == patch_lines.len() - 1 {
                    idx += 1;
                    break;
                } else {
                    return Err(CoreError::invalid_argument("invalid patch line"));
                }
            }

            let (marker, rest) = body.split_at(1);
            match marker {
                "\\" => {}
                " " => {
                    if cursor >= orig_lines.len() || orig_lines[cursor] != rest {
                        return Err(CoreError::PatchMismatch("patch context mismatch".to_string()));
                    }
                    out.push(rest);
                    cursor += 1;
                }
                "-" => {
                    if cursor >= orig_lines.len() || orig_lines[cursor] != rest {
                        return Err(CoreError::PatchMismatch("patch delete mismatch".to_string()));
                    }
                    cursor += 1;
                }
                "+" => {
                    out.push(rest);
                }
                other => {
                    return Err(CoreError::invalid_argument(format!(
                        "invalid patch operation: {other}"
                    )));
                }
            }
            idx += 1;
        }
    }

    if !found_any_hunk {
        return Err(CoreError::invalid_argument("patch contains no hunks"));
    }

    out.extend_from_slice(&orig_lines[cursor..]);
    Ok(out.join("\n"))
}

/// Produces a unified diff with 3 lines of context between `old` and `new`,
/// framed with `a<path>` / `b<path>` headers, per §4.5 Diff().
pub fn produce_unified_diff(old: &str, new: &str, container_path: &str) -> String {
    let diff = similar::TextDiff::from_lines(old, new);
    diff.unified_diff()
        .context_radius(3)
        .header(&format!("a{container_path}"), &format!("b{container_path}"))
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applies_simple_replacement() {
        let original = "one\ntwo\nthree\n";
        let patch = "@@ -2,1 +2,1 @@\n-two\n+TWO\n";
        let result = apply_unified_diff(original, patch).unwrap();
        assert_eq!(result, "one\nTWO\nthree\n");
    }

    #[test]
    fn rejects_mismatched_deletion() {
        let original = "one\ntwo\nthree\n";
        let patch = "@@ -2,1 +2,1 @@\n-TWO\n+two\n";
        let err = apply_unified_diff(original, patch).unwrap_err();
        assert!(matches!(err, CoreError::PatchMismatch(_)));
    }

    #[test]
    fn rejects_patch_without_hunks() {
        let err = apply_unified_diff("a\nb\n", "").unwrap_err();
        assert!(matches!(err, CoreError::InvalidArgument(_)));
    }

    #[test]
    fn rejects_invalid_hunk_header() {
        let err = apply_unified_diff("a\nb\n", "not a hunk header\n").unwrap_err();
        assert!(matches!(err, CoreError::InvalidArgument(_)));
    }

    #[test]
    fn round_trips_through_produced_diff() {
        let old = "one\ntwo\nthree\n";
        let new = "one\nTWO\nthree\nfour\n";
        let diff = produce_unified_diff(old, new, "/data/a.txt");
        let patched = apply_unified_diff(old, &diff).unwrap();
        assert_eq!(patched, new);
    }

    #[test]
    fn context_lines_pass_through_unchanged() {
        let original = "alpha\nbeta\ngamma\ndelta\n";
        let patch = "@@ -1,4 +1,4 @@\n alpha\n beta\n-gamma\n+GAMMA\n delta\n";
        let result = apply_unified_diff(original, patch).unwrap();
        assert_eq!(result, "alpha\nbeta\nGAMMA\ndelta\n");
    }
}
