//! System prompt assembly: persona, command catalog, retrieved context.
//!
//! The system turn is synthesized per request rather than stored, so the
//! catalog always reflects the current registry and the retrieval block
//! always matches the query.

use colloquy_core::command::ExecutorDescriptor;
use colloquy_core::retrieval::RetrievedChunk;
use colloquy_grammar::FENCE;

pub const DEFAULT_PERSONA: &str = "You are Colloquy, a concise assistant. \
    Use commands when they get the user a better answer; otherwise just answer.";

/// Build the system prompt for one request.
pub fn system_prompt(
    persona: &str,
    commands: &[ExecutorDescriptor],
    retrieved: &[RetrievedChunk],
) -> String {
    let mut prompt = persona.to_string();
    prompt.push_str(&command_catalog(commands));
    prompt.push_str(&retrieval_block(retrieved));
    prompt
}

/// The command catalog block. Empty when nothing is registered — a model
/// with no commands should not be taught the call syntax.
fn command_catalog(commands: &[ExecutorDescriptor]) -> String {
    if commands.is_empty() {
        return String::new();
    }

    let mut block = String::from("\n\n## Commands\n");
    block.push_str(&format!(
        "To run a command, emit exactly this, fences included:\n\
         {FENCE}{{\"cmd\": \"<name>\", \"params\": {{...}}}}{FENCE}\n\
         The call body is one JSON object. The {FENCE} fence must never \
         appear inside it. After emitting a call, stop and wait: each \
         result comes back as a JSON message before your next turn. \
         Only these commands exist:\n\n"
    ));
    for descriptor in commands {
        block.push_str(&format!(
            "- {}: {} Parameters schema: {}\n",
            descriptor.name,
            descriptor.description,
            serde_json::to_string(&descriptor.params_schema).unwrap_or_default()
        ));
    }
    block
}

/// Retrieved snippets, highest score first as given, cited by source.
fn retrieval_block(retrieved: &[RetrievedChunk]) -> String {
    if retrieved.is_empty() {
        return String::new();
    }

    let mut block = String::from("\n\n## Retrieved Context\n");
    for (i, chunk) in retrieved.iter().enumerate() {
        block.push_str(&format!("{}. [{}] {}\n", i + 1, chunk.source, chunk.text));
    }
    block
}

#[cfg(test)]
mod tests {
    use super::*;
    use colloquy_core::command::SideEffect;

    fn descriptor(name: &str) -> ExecutorDescriptor {
        ExecutorDescriptor::new(name, "does a thing.")
            .with_schema(serde_json::json!({
                "type": "object",
                "properties": { "path": { "type": "string" } }
            }))
            .with_side_effect(SideEffect::ReadOnly)
    }

    #[test]
    fn catalog_lists_commands_and_fence() {
        let prompt = system_prompt("persona", &[descriptor("list_files")], &[]);
        assert!(prompt.starts_with("persona"));
        assert!(prompt.contains("## Commands"));
        assert!(prompt.contains("- list_files: does a thing."));
        assert!(prompt.contains(FENCE));
        assert!(prompt.contains(r#""path""#));
    }

    #[test]
    fn no_commands_no_catalog() {
        let prompt = system_prompt("persona", &[], &[]);
        assert_eq!(prompt, "persona");
        assert!(!prompt.contains(FENCE));
    }

    #[test]
    fn retrieval_block_cites_sources() {
        let chunks = vec![
            RetrievedChunk {
                source: "notes.md".into(),
                text: "The deploy runs at midnight.".into(),
                score: 0.9,
            },
            RetrievedChunk {
                source: "runbook.md".into(),
                text: "Restart with systemctl.".into(),
                score: 0.7,
            },
        ];
        let prompt = system_prompt("persona", &[], &chunks);
        assert!(prompt.contains("## Retrieved Context"));
        assert!(prompt.contains("1. [notes.md] The deploy runs at midnight."));
        assert!(prompt.contains("2. [runbook.md]"));
    }
}
