//! Reference resolver: rewrites a task's parameters, substituting string
//! expressions that point at earlier task results.
//!
//! The grammar is parsed into a small typed expression tree and evaluated
//! by one recursive evaluator:
//!
//! ```text
//! "t1.result"              -> TaskRef          raw result object
//! "t1.result.title"        -> FieldPath        known leaf, extracted from result.data.title
//! "t1.result.a,t2.result.b"-> Join             ordered scalars, empties skipped
//! "t1.result.x + t2.result.y" -> Concat        left-to-right list extension
//! "t1.result.data.recipes" -> FieldPath        nested walk, title lists collapse
//! "session.context.stage"  -> SessionContextRef passed through untouched
//! ```
//!
//! Resolution is never fatal: an unresolved reference leaves the literal in
//! place with a warning, and surfaces later as the target operation's own
//! validation error.

mod eval;
mod expr;
mod parser;

pub use eval::{resolve_parameters, resolve_value};
pub use expr::RefExpr;
pub use parser::{parse, session_context_key, SESSION_CONTEXT_PREFIX};
