use lazy_static::lazy_static;
use std::collections::HashSet;

use super::expr::RefExpr;

pub const SESSION_CONTEXT_PREFIX: &str = "session.context.";

lazy_static! {
    /// Scalar leaves the recipe service returns under `result.data`.
    /// A single-segment path naming one of these reads `result.data.<field>`;
    /// anything else walks the raw result object.
    static ref KNOWN_RESULT_FIELDS: HashSet<&'static str> =
        ["id", "recipe_id", "title", "url", "category"].into_iter().collect();
}

/// `session.context.<key>` -> `<key>`.
pub fn session_context_key(raw: &str) -> Option<&str> {
    let key = raw.strip_prefix(SESSION_CONTEXT_PREFIX)?;
    if key.is_empty() {
        None
    } else {
        Some(key)
    }
}

/// Parse one string parameter value into its expression form.
///
/// Grammar priority matches evaluation priority: session-context refs are
/// recognized first, then comma joins, then `+` concatenation, then plain
/// task paths; everything else is a literal.
pub fn parse(raw: &str) -> RefExpr {
    if let Some(key) = session_context_key(raw) {
        return RefExpr::SessionContext(key.to_string());
    }

    if raw.contains(',') {
        if let Some(join) = parse_join(raw) {
            return join;
        }
    }

    if raw.contains('+') {
        if let Some(concat) = parse_concat(raw) {
            return concat;
        }
    }

    parse_task_path(raw).unwrap_or(RefExpr::Literal)
}

/// All comma-separated pieces must be single-field references, otherwise
/// the whole string falls through to the next rule.
fn parse_join(raw: &str) -> Option<RefExpr> {
    let pieces: Vec<&str> = raw.split(',').map(str::trim).collect();
    if pieces.len() < 2 {
        return None;
    }

    let mut parts = Vec::with_capacity(pieces.len());
    for piece in pieces {
        match parse_task_path(piece) {
            Some(expr @ RefExpr::FieldPath { .. }) if is_single_field(piece) => parts.push(expr),
            _ => return None,
        }
    }
    Some(RefExpr::Join(parts))
}

/// At least one `+` side must be a task path; non-reference sides are kept
/// as literals and appended as-is during evaluation.
fn parse_concat(raw: &str) -> Option<RefExpr> {
    let sides: Vec<&str> = raw.split('+').map(str::trim).collect();
    if sides.len() < 2 || sides.iter().any(|s| s.is_empty()) {
        return None;
    }

    let parsed: Vec<(String, RefExpr)> = sides
        .iter()
        .map(|side| {
            (
                side.to_string(),
                parse_task_path(side).unwrap_or(RefExpr::Literal),
            )
        })
        .collect();

    if parsed.iter().any(|(_, e)| !matches!(e, RefExpr::Literal)) {
        Some(RefExpr::Concat(parsed))
    } else {
        None
    }
}

/// `<id>.result` or `<id>.result.<p1>...<pn>`.
fn parse_task_path(raw: &str) -> Option<RefExpr> {
    let segments: Vec<&str> = raw.split('.').collect();
    if segments.len() < 2 || segments[1] != "result" || !is_task_id(segments[0]) {
        return None;
    }

    if segments.len() == 2 {
        return Some(RefExpr::TaskRef(segments[0].to_string()));
    }

    if segments.len() == 3 && KNOWN_RESULT_FIELDS.contains(segments[2]) {
        return Some(RefExpr::FieldPath {
            task_id: segments[0].to_string(),
            path: vec!["data".to_string(), segments[2].to_string()],
        });
    }

    if !segments[2..].iter().all(|s| is_path_segment(s)) {
        return None;
    }

    Some(RefExpr::FieldPath {
        task_id: segments[0].to_string(),
        path: segments[2..].iter().map(|s| s.to_string()).collect(),
    })
}

fn is_path_segment(s: &str) -> bool {
    !s.is_empty() && !s.chars().any(|c| c == ',' || c == '+' || c.is_whitespace())
}

fn is_single_field(raw: &str) -> bool {
    raw.split('.').count() == 3
}

fn is_task_id(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
