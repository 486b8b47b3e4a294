//! Command synthesis: prompt construction and the parser that recovers a
//! structured draft from the model's free-text reply.
//!
//! The model is asked for labeled fields and a fenced code block, but replies
//! drift; the parser applies an ordered fallback chain and either yields a
//! complete draft or a tagged failure, never a partially usable one.

use std::sync::LazyLock;

use regex::Regex;
use tracing::{info, warn};

use forge_types::CommandFault;

use crate::generate::{GenerationRequest, TextGenerator};

/// Placeholder name when neither the reply nor the description yields one.
pub const FALLBACK_COMMAND_NAME: &str = "custom_cmd";

/// Derived names are clipped to this length; explicit names are not.
const DERIVED_NAME_MAX_LEN: usize = 20;

const CODE_MAX_OUTPUT_TOKENS: u32 = 2048;
const CODE_TEMPERATURE: f32 = 0.7;

const CODE_SYSTEM_PROMPT: &str = "\
You write Rhai script commands for a chat bot. Rules:
- Define exactly `fn run(ctx)` taking the single invocation context argument.
- Send output with `ctx.reply(text)`; no other way to respond exists.
- Available on ctx: reply(text), user_name(), guild_name().
- Also available: random(min, max), log(text).
- Do not open dialogs or prompt for further input.
- The code must be complete and untruncated.
Reply in this exact format:
COMMAND_NAME: <short_lowercase_name>
DESCRIPTION: <one line>
CODE:
```rhai
<the script>
```";

static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"COMMAND_NAME:\s*([A-Za-z0-9_\-]+)").unwrap());
static DESCRIPTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"DESCRIPTION:\s*(.+?)(?:\n|CODE:|$)").unwrap());
static FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```[a-zA-Z0-9]*\n(.*?)```").unwrap());
static ENTRY_POINT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"fn\s+run\s*\(").unwrap());

/// A complete, parseable synthesis result. Not yet validated — callers must
/// run the code through the safety validator before binding it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandDraft {
    pub name: String,
    pub code: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("the model reply contained no code")]
    NoCode,
    #[error("the generated code does not define `fn run(ctx)`")]
    MissingEntryPoint,
}

/// Recover a draft from a free-text model reply.
///
/// Fallback order: labeled `COMMAND_NAME:` then a name derived from the
/// user's description; labeled `DESCRIPTION:` then a generic one; fenced
/// code block then an indentation scan from the entry-point line. A reply
/// with no extractable code, or code without the entry point, fails whole.
pub fn parse_reply(description: &str, reply: &str) -> Result<CommandDraft, ParseError> {
    let name = match NAME_RE.captures(reply) {
        Some(captures) => captures[1].to_lowercase(),
        None => derive_name(description),
    };
    let code = extract_code(reply).ok_or(ParseError::NoCode)?;
    if !ENTRY_POINT_RE.is_match(&code) {
        return Err(ParseError::MissingEntryPoint);
    }
    let command_description = match DESCRIPTION_RE.captures(reply) {
        Some(captures) => captures[1].trim().to_string(),
        None => forge_types::DynamicCommandEntry::default_description(&name),
    };
    Ok(CommandDraft {
        name,
        code,
        description: command_description,
    })
}

/// Join the first two alphanumeric words of the description, lowercased and
/// clipped, as a usable command name.
fn derive_name(description: &str) -> String {
    let joined = description
        .split_whitespace()
        .filter(|word| !word.is_empty() && word.chars().all(|c| c.is_ascii_alphanumeric()))
        .take(2)
        .collect::<Vec<_>>()
        .join("_")
        .to_lowercase();
    if joined.is_empty() {
        return FALLBACK_COMMAND_NAME.to_string();
    }
    joined.chars().take(DERIVED_NAME_MAX_LEN).collect()
}

fn extract_code(reply: &str) -> Option<String> {
    if let Some(captures) = FENCE_RE.captures(reply) {
        let code = captures[1].trim_end().to_string();
        return (!code.is_empty()).then_some(code);
    }
    scan_unfenced(reply)
}

/// Collect the entry-point definition plus the lines that belong to it:
/// everything more deeply indented, up to and including the closing brace
/// at the definition's own indentation.
fn scan_unfenced(reply: &str) -> Option<String> {
    let mut lines = reply.lines();
    let header = lines.find(|line| ENTRY_POINT_RE.is_match(line))?;
    let entry_indent = indent_of(header);
    let mut code = vec![header];
    for line in lines {
        if line.trim().is_empty() {
            code.push(line);
            continue;
        }
        if indent_of(line) > entry_indent {
            code.push(line);
            continue;
        }
        if line.trim_start().starts_with('}') {
            code.push(line);
        }
        break;
    }
    Some(code.join("\n").trim_end().to_string())
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

/// The synthesis adapter over a [`TextGenerator`].
#[derive(Debug, Clone)]
pub struct CodeGenerator<G> {
    generator: G,
}

impl<G: TextGenerator> CodeGenerator<G> {
    pub fn new(generator: G) -> Self {
        Self { generator }
    }

    /// Turn a natural-language description into a command draft.
    pub async fn generate_command(&self, description: &str) -> Result<CommandDraft, CommandFault> {
        let request = GenerationRequest::new(format!("Create a command that: {description}"))
            .with_system(CODE_SYSTEM_PROMPT)
            .with_limits(CODE_MAX_OUTPUT_TOKENS, CODE_TEMPERATURE);
        let reply = self
            .generator
            .generate(request)
            .await
            .map_err(|e| CommandFault::GenerationFailure {
                reason: e.to_string(),
            })?;
        let draft =
            parse_reply(description, &reply).map_err(|e| CommandFault::GenerationFailure {
                reason: e.to_string(),
            })?;
        info!(name = %draft.name, "command draft generated");
        Ok(draft)
    }

    /// Ask the model how to fix code that was rejected or failed to bind.
    /// Advisory only: any failure here degrades to no suggestion.
    pub async fn suggest_fix(&self, code: &str, error: &str) -> Option<String> {
        let request = GenerationRequest::new(format!(
            "This Rhai command script failed with: {error}\n\n\
             Code:\n{code}\n\n\
             Explain the fix in at most three sentences."
        ));
        match self.generator.generate(request).await {
            Ok(text) => Some(text.trim().to_string()),
            Err(reason) => {
                warn!(%reason, "fix suggestion unavailable");
                None
            }
        }
    }

    /// Moderation check: true when the message should be flagged.
    /// Degrades to "not flagged" on any generation failure.
    pub async fn is_message_unsafe(&self, content: &str) -> bool {
        let request = GenerationRequest::new(format!(
            "Classify this chat message as SAFE or UNSAFE for a community \
             server (slurs, threats, doxxing are UNSAFE). \
             Answer with the single word SAFE or UNSAFE.\n\nMessage: {content}"
        ))
        .with_limits(8, 0.0);
        match self.generator.generate(request).await {
            Ok(reply) => reply.trim().to_uppercase().starts_with("UNSAFE"),
            Err(reason) => {
                warn!(%reason, "moderation classification unavailable");
                false
            }
        }
    }

    /// Plain Q&A passthrough used by the chat command.
    pub async fn chat(&self, question: &str) -> Result<String, CommandFault> {
        self.generator
            .generate(GenerationRequest::new(question))
            .await
            .map(|reply| reply.trim().to_string())
            .map_err(|e| CommandFault::GenerationFailure {
                reason: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockGenerator;

    const PING_REPLY: &str = "COMMAND_NAME: pingcmd\n\
        DESCRIPTION: replies pong\n\
        CODE:\n\
        ```rhai\n\
        fn run(ctx) {\n    ctx.reply(\"pong\");\n}\n\
        ```";

    #[test]
    fn test_parse_labeled_reply_with_fenced_block() {
        let draft = parse_reply("make a ping command", PING_REPLY).unwrap();
        assert_eq!(draft.name, "pingcmd");
        assert_eq!(draft.description, "replies pong");
        assert!(draft.code.contains("fn run(ctx)"));
        assert!(draft.code.contains("pong"));
    }

    #[test]
    fn test_name_falls_back_to_description_words() {
        let reply = "```rhai\nfn run(ctx) { ctx.reply(\"hi\"); }\n```";
        let draft = parse_reply("Make a Dice roller!", reply).unwrap();
        assert_eq!(draft.name, "make_a");
    }

    #[test]
    fn test_name_falls_back_to_placeholder() {
        let reply = "```rhai\nfn run(ctx) { ctx.reply(\"hi\"); }\n```";
        let draft = parse_reply("!!! ???", reply).unwrap();
        assert_eq!(draft.name, FALLBACK_COMMAND_NAME);
    }

    #[test]
    fn test_derived_name_is_clipped() {
        let reply = "```rhai\nfn run(ctx) { }\n```";
        let draft = parse_reply("supercalifragilistic expialidocious", reply).unwrap();
        assert_eq!(draft.name.chars().count(), DERIVED_NAME_MAX_LEN);
    }

    #[test]
    fn test_description_defaults_when_unlabeled() {
        let reply = "COMMAND_NAME: greet\n```rhai\nfn run(ctx) { ctx.reply(\"hi\"); }\n```";
        let draft = parse_reply("greet people", reply).unwrap();
        assert_eq!(draft.description, "Dynamic command: greet");
    }

    #[test]
    fn test_unfenced_code_collected_by_indentation() {
        let reply = "Here is the command:\nfn run(ctx) {\n    let who = ctx.user_name();\n    ctx.reply(who);\n}\nThat should do it.";
        let draft = parse_reply("greet", reply).unwrap();
        assert!(draft.code.starts_with("fn run(ctx)"));
        assert!(draft.code.trim_end().ends_with('}'));
        assert!(!draft.code.contains("should do it"));
    }

    #[test]
    fn test_reply_without_code_fails_whole() {
        let err = parse_reply("x", "COMMAND_NAME: a\nDESCRIPTION: b").unwrap_err();
        assert_eq!(err, ParseError::NoCode);
    }

    #[test]
    fn test_code_without_entry_point_fails_whole() {
        let reply = "```rhai\nfn main() { print(\"hi\"); }\n```";
        let err = parse_reply("x", reply).unwrap_err();
        assert_eq!(err, ParseError::MissingEntryPoint);
    }

    #[tokio::test]
    async fn test_generate_command_end_to_end() {
        let generator = CodeGenerator::new(MockGenerator::with_reply(PING_REPLY));
        let draft = generator.generate_command("ping command").await.unwrap();
        assert_eq!(draft.name, "pingcmd");
    }

    #[tokio::test]
    async fn test_generate_command_maps_transport_failure() {
        let mock = MockGenerator::new();
        mock.set_fail(true);
        let generator = CodeGenerator::new(mock);
        let err = generator.generate_command("ping").await.unwrap_err();
        assert!(matches!(err, CommandFault::GenerationFailure { .. }));
    }

    #[tokio::test]
    async fn test_suggest_fix_degrades_to_none() {
        let mock = MockGenerator::new();
        mock.set_fail(true);
        let generator = CodeGenerator::new(mock);
        assert!(generator.suggest_fix("fn run(ctx) {}", "boom").await.is_none());
    }

    #[tokio::test]
    async fn test_moderation_classification() {
        let generator = CodeGenerator::new(MockGenerator::with_reply("UNSAFE"));
        assert!(generator.is_message_unsafe("some message").await);
        let generator = CodeGenerator::new(MockGenerator::with_reply("SAFE"));
        assert!(!generator.is_message_unsafe("some message").await);
    }
}
