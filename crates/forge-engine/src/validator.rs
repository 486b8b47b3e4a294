//! Static safety validation of submitted command scripts.
//!
//! Five checks in fixed priority order, failing fast on the first violation:
//! parse, dynamic-evaluation denylist over the syntax tree, reserved-member
//! access, source length, and the required `run` entry point. The validator
//! is advisory-static only; runtime isolation is the executor's job.

use std::sync::LazyLock;

use regex::Regex;
use rhai::{ASTNode, Engine, Expr, Stmt};

use forge_types::CommandFault;

/// Submissions longer than this are rejected outright.
pub const MAX_SOURCE_LEN: usize = 10_000;

/// Script-callable primitives that can evaluate or load code at runtime.
const DENYLIST: &[&str] = &["eval", "Fn", "compile"];

/// Lexical, not syntactic: a dunder token anywhere in the source is
/// rejected, including inside string literals and comments.
static DUNDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[^A-Za-z0-9_])(__[A-Za-z0-9_]+)").unwrap());

pub struct Validator {
    engine: Engine,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

impl Validator {
    pub fn new() -> Self {
        // Parse-only engine: nothing is registered, nothing ever runs.
        Self {
            engine: Engine::new_raw(),
        }
    }

    pub fn validate(&self, source: &str) -> Result<(), CommandFault> {
        let ast = self
            .engine
            .compile(source)
            .map_err(|e| unsafe_code(format!("code does not parse: {e}")))?;

        let mut violation: Option<String> = None;
        ast.walk(&mut |path| {
            let Some(node) = path.last() else { return true };
            match node {
                ASTNode::Expr(Expr::FnCall(call, _)) | ASTNode::Expr(Expr::MethodCall(call, _)) => {
                    let name = call.name.as_str();
                    if DENYLIST.contains(&name) {
                        violation = Some(format!(
                            "call to `{name}` is not allowed: dynamic code evaluation is blocked"
                        ));
                        return false;
                    }
                }
                ASTNode::Stmt(Stmt::Import(..)) => {
                    violation = Some("import statements are not allowed".to_string());
                    return false;
                }
                _ => {}
            }
            true
        });
        if let Some(reason) = violation {
            return Err(unsafe_code(reason));
        }

        if let Some(captures) = DUNDER_RE.captures(source) {
            return Err(unsafe_code(format!(
                "access to reserved member `{}` is not allowed",
                &captures[1]
            )));
        }

        if source.chars().count() > MAX_SOURCE_LEN {
            return Err(unsafe_code(format!(
                "source exceeds {MAX_SOURCE_LEN} characters"
            )));
        }

        let has_entry_point = ast
            .iter_functions()
            .any(|f| f.name == "run" && f.params.len() == 1);
        if !has_entry_point {
            return Err(unsafe_code(
                "code must define `fn run(ctx)` taking exactly one argument".to_string(),
            ));
        }

        Ok(())
    }
}

fn unsafe_code(reason: String) -> CommandFault {
    CommandFault::UnsafeCode {
        reason,
        suggestion: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reason(fault: CommandFault) -> String {
        match fault {
            CommandFault::UnsafeCode { reason, .. } => reason,
            other => panic!("expected UnsafeCode, got {other:?}"),
        }
    }

    #[test]
    fn test_accepts_plain_command() {
        let validator = Validator::new();
        assert!(validator
            .validate("fn run(ctx) {\n    ctx.reply(\"pong\");\n}")
            .is_ok());
    }

    #[test]
    fn test_rejects_unparseable_source() {
        let validator = Validator::new();
        let msg = reason(validator.validate("fn run(ctx) {").unwrap_err());
        assert!(msg.contains("does not parse"));
    }

    #[test]
    fn test_rejects_eval_anywhere_in_source() {
        let validator = Validator::new();
        // Top level of the entry point.
        let msg = reason(
            validator
                .validate("fn run(ctx) { eval(\"1\"); }")
                .unwrap_err(),
        );
        assert!(msg.contains("`eval`"));
        // Nested inside another function and a branch.
        let nested = "fn helper(x) { if x > 0 { eval(\"1\") } else { x } }\nfn run(ctx) { helper(1); }";
        let msg = reason(validator.validate(nested).unwrap_err());
        assert!(msg.contains("`eval`"));
    }

    #[test]
    fn test_rejects_function_pointer_from_string() {
        let validator = Validator::new();
        let source = "fn run(ctx) { let f = Fn(\"print\"); }";
        let msg = reason(validator.validate(source).unwrap_err());
        assert!(msg.contains("`Fn`"));
    }

    #[test]
    fn test_rejects_import_statement() {
        let validator = Validator::new();
        let source = "import \"os\" as os;\nfn run(ctx) { }";
        let msg = reason(validator.validate(source).unwrap_err());
        assert!(msg.contains("import"));
    }

    #[test]
    fn test_rejects_reserved_member_access() {
        let validator = Validator::new();
        let source = "fn run(ctx) { let x = ctx.__internal; }";
        let msg = reason(validator.validate(source).unwrap_err());
        assert!(msg.contains("__internal"));
    }

    #[test]
    fn test_rejects_oversized_source_even_if_safe() {
        let validator = Validator::new();
        let padding = "// filler\n".repeat(1_100);
        let source = format!("fn run(ctx) {{ ctx.reply(\"hi\"); }}\n{padding}");
        assert!(source.chars().count() > MAX_SOURCE_LEN);
        let msg = reason(validator.validate(&source).unwrap_err());
        assert!(msg.contains("exceeds"));
    }

    #[test]
    fn test_length_limit_counts_characters_not_bytes() {
        let validator = Validator::new();
        // Multibyte comment padding: over 10k bytes, under 10k characters.
        let padding = "// ééééééé\n".repeat(900);
        let source = format!("fn run(ctx) {{ ctx.reply(\"hi\"); }}\n{padding}");
        assert!(source.len() > MAX_SOURCE_LEN);
        assert!(source.chars().count() <= MAX_SOURCE_LEN);
        assert!(validator.validate(&source).is_ok());
    }

    #[test]
    fn test_rejects_reserved_member_even_inside_string_literal() {
        let validator = Validator::new();
        let source = "fn run(ctx) { ctx.reply(\"__internal\"); }";
        let msg = reason(validator.validate(source).unwrap_err());
        assert!(msg.contains("__internal"));
    }

    #[test]
    fn test_rejects_missing_run_entry_point() {
        let validator = Validator::new();
        let msg = reason(
            validator
                .validate("fn main(ctx) { ctx.reply(\"hi\"); }")
                .unwrap_err(),
        );
        assert!(msg.contains("fn run(ctx)"));
    }

    #[test]
    fn test_rejects_run_with_wrong_arity() {
        let validator = Validator::new();
        let msg = reason(validator.validate("fn run() { }").unwrap_err());
        assert!(msg.contains("exactly one argument"));
    }

    #[test]
    fn test_denylist_beats_length_and_entry_point_checks() {
        let validator = Validator::new();
        // No run entry point AND a denylisted call: the walk runs first.
        let msg = reason(validator.validate("eval(\"1\");").unwrap_err());
        assert!(msg.contains("`eval`"));
    }
}
