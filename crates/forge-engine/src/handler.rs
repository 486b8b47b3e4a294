//! Capability-scoped execution of bound command scripts.
//!
//! Scripts see only the invocation context handed to `run` — there is no
//! ambient host access. Each invocation gets a fresh engine with hard
//! resource caps, runs off the async scheduling path, and is abandoned
//! after a fixed wall-clock timeout.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::Rng;
use rhai::{Engine, Scope, AST};
use tracing::{error, info};

use forge_types::CommandFault;

/// Wall-clock cap on one handler invocation. On expiry the blocking task is
/// abandoned, not interrupted; the engine's operation cap bounds it.
pub const HANDLER_TIMEOUT: Duration = Duration::from_secs(60);

const MAX_OPERATIONS: u64 = 500_000;
const MAX_STRING_SIZE: usize = 16 * 1024;
const MAX_COLLECTION_SIZE: usize = 4_096;
const MAX_CALL_LEVELS: usize = 32;

/// Identity and scope info for one user-triggered execution.
#[derive(Debug, Clone, Default)]
pub struct Invocation {
    pub user_name: String,
    pub guild_name: String,
}

/// The object handed to the script's `run` entry point. Everything a script
/// can do goes through a method registered here.
#[derive(Clone)]
pub struct ScriptContext {
    user_name: String,
    guild_name: String,
    replies: Arc<Mutex<Vec<String>>>,
}

impl ScriptContext {
    fn reply(&mut self, text: &str) {
        self.replies.lock().unwrap().push(text.to_string());
    }

    fn user_name(&mut self) -> String {
        self.user_name.clone()
    }

    fn guild_name(&mut self) -> String {
        self.guild_name.clone()
    }
}

// The only logging surface scripts get.
fn script_log(text: &str) {
    info!(target: "dynamic_command", "{text}");
}

fn random_range(min: i64, max: i64) -> i64 {
    let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
    rand::thread_rng().gen_range(lo..=hi)
}

fn scoped_engine() -> Engine {
    let mut engine = Engine::new();
    engine.disable_symbol("eval");
    engine.set_max_operations(MAX_OPERATIONS);
    engine.set_max_string_size(MAX_STRING_SIZE);
    engine.set_max_array_size(MAX_COLLECTION_SIZE);
    engine.set_max_map_size(MAX_COLLECTION_SIZE);
    engine.set_max_call_levels(MAX_CALL_LEVELS);
    engine
        .register_type_with_name::<ScriptContext>("Context")
        .register_fn("reply", ScriptContext::reply)
        .register_fn("user_name", ScriptContext::user_name)
        .register_fn("guild_name", ScriptContext::guild_name)
        .register_fn("random", random_range)
        .register_fn("log", script_log);
    engine
}

/// A validated script compiled and ready to invoke.
#[derive(Debug, Clone)]
pub struct ScriptHandler {
    ast: AST,
}

impl ScriptHandler {
    /// Compile `source` into an invocable handler.
    pub fn bind(source: &str) -> Result<Self, CommandFault> {
        let ast = scoped_engine()
            .compile(source)
            .map_err(|e| CommandFault::BindingFailure {
                reason: format!("code failed to compile: {e}"),
                suggestion: None,
            })?;
        let has_entry_point = ast
            .iter_functions()
            .any(|f| f.name == "run" && f.params.len() == 1);
        if !has_entry_point {
            return Err(CommandFault::BindingFailure {
                reason: "code does not define a callable `fn run(ctx)`".to_string(),
                suggestion: None,
            });
        }
        Ok(Self { ast })
    }

    /// Run the entry point and collect the replies it sent. Script errors
    /// are logged with full detail here and surfaced as a generic fault.
    pub async fn invoke(&self, invocation: Invocation) -> Result<Vec<String>, CommandFault> {
        let replies = Arc::new(Mutex::new(Vec::new()));
        let ctx = ScriptContext {
            user_name: invocation.user_name,
            guild_name: invocation.guild_name,
            replies: Arc::clone(&replies),
        };
        let ast = self.ast.clone();
        let task = tokio::task::spawn_blocking(move || {
            let engine = scoped_engine();
            let mut scope = Scope::new();
            engine
                .call_fn::<rhai::Dynamic>(&mut scope, &ast, "run", (ctx,))
                .map(|_| ())
                .map_err(|e| e.to_string())
        });

        let outcome = match tokio::time::timeout(HANDLER_TIMEOUT, task).await {
            Err(_) => Err(format!(
                "handler exceeded the {}s execution timeout",
                HANDLER_TIMEOUT.as_secs()
            )),
            Ok(Err(join_error)) => Err(format!("handler task failed: {join_error}")),
            Ok(Ok(result)) => result,
        };

        match outcome {
            Ok(()) => Ok(replies.lock().unwrap().clone()),
            Err(reason) => {
                error!(%reason, "dynamic command handler failed");
                Err(CommandFault::HandlerRuntime { reason })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_invoke_collects_replies() {
        let handler = ScriptHandler::bind("fn run(ctx) { ctx.reply(\"pong\"); }").unwrap();
        let replies = handler.invoke(Invocation::default()).await.unwrap();
        assert_eq!(replies, vec!["pong".to_string()]);
    }

    #[tokio::test]
    async fn test_context_exposes_identity() {
        let handler = ScriptHandler::bind(
            "fn run(ctx) { ctx.reply(ctx.user_name() + \"@\" + ctx.guild_name()); }",
        )
        .unwrap();
        let invocation = Invocation {
            user_name: "alice".to_string(),
            guild_name: "testers".to_string(),
        };
        let replies = handler.invoke(invocation).await.unwrap();
        assert_eq!(replies, vec!["alice@testers".to_string()]);
    }

    #[tokio::test]
    async fn test_random_capability_stays_in_range() {
        let handler =
            ScriptHandler::bind("fn run(ctx) { ctx.reply(random(1, 6).to_string()); }").unwrap();
        let replies = handler.invoke(Invocation::default()).await.unwrap();
        let value: i64 = replies[0].parse().unwrap();
        assert!((1..=6).contains(&value));
    }

    #[tokio::test]
    async fn test_script_error_is_a_generic_runtime_fault() {
        let handler = ScriptHandler::bind("fn run(ctx) { let x = 1 / 0; }").unwrap();
        let fault = handler.invoke(Invocation::default()).await.unwrap_err();
        assert!(matches!(fault, CommandFault::HandlerRuntime { .. }));
        assert!(!fault.user_message().contains("zero"));
    }

    #[tokio::test]
    async fn test_runaway_loop_hits_operation_cap() {
        let handler = ScriptHandler::bind("fn run(ctx) { loop { } }").unwrap();
        let fault = handler.invoke(Invocation::default()).await.unwrap_err();
        assert!(matches!(fault, CommandFault::HandlerRuntime { .. }));
    }

    #[test]
    fn test_bind_rejects_missing_entry_point() {
        let fault = ScriptHandler::bind("fn helper(x) { x }").unwrap_err();
        assert!(matches!(fault, CommandFault::BindingFailure { .. }));
    }
}
