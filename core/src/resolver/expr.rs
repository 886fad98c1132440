/// Parsed form of one string parameter value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefExpr {
    /// Not a reference; the raw string passes through unchanged.
    Literal,

    /// `session.context.<key>` — substituted by the orchestrator against
    /// the active session before the resolver runs; the resolver itself
    /// passes it through untouched.
    SessionContext(String),

    /// `<id>.result` — the raw result object of task `id`.
    TaskRef(String),

    /// `<id>.result.<p1>...<pn>` — successive mapping lookups. For the
    /// known leaf fields the parser inserts the implicit `data` hop.
    FieldPath { task_id: String, path: Vec<String> },

    /// Comma-joined single-field references.
    Join(Vec<RefExpr>),

    /// `+`-joined sides, each kept with its raw text for the
    /// unresolved-side fallback.
    Concat(Vec<(String, RefExpr)>),
}
