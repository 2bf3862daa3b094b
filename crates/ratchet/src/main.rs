//! A simple program that walks a task through the agent loop end to end,
//! using a scripted backend and the bundled tools. The tool results in
//! the printed trace are computed live; only the backend turns are
//! scripted, so the demo stays fully offline.

#[macro_use]
extern crate tracing;

use owo_colors::OwoColorize;
use ratchet::tools::{CalcTool, ClockTool, SearchTool};
use ratchet_core::conversation::Role;
use ratchet_core::{AgentLoopBuilder, LoopStatus};
use ratchet_model::ToolCallRequest;
use ratchet_test_model::{ScriptEvent, ScriptedBackend, ScriptedTurn};
use serde_json::json;

const BAR_CHAR: &str = "▎";

const SYSTEM_PROMPT: &str = "You are a helpful assistant. Use the \
available tools to gather what you need, then finish with a concise \
answer.";

const TASK: &str = "What is (2 + 3) * 4, what time is it right now, and \
what is the capital of France?";

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let outcome = AgentLoopBuilder::with_backend(demo_backend())
        .with_system_prompt(SYSTEM_PROMPT)
        .with_tool(CalcTool::new())
        .with_tool(ClockTool::new())
        .with_tool(SearchTool::new())
        .with_max_steps(8)
        .build()
        .run(TASK)
        .await;

    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(err) => {
            error!("invalid configuration: {err}");
            return;
        }
    };

    for turn in &outcome.trace {
        let (bar, label) = match turn.role {
            Role::System => (BAR_CHAR.bright_magenta().to_string(), "📜"),
            Role::User => (BAR_CHAR.bright_green().to_string(), "🧑"),
            Role::Agent => (BAR_CHAR.bright_cyan().to_string(), "🤖"),
            Role::ToolResult => (BAR_CHAR.bright_yellow().to_string(), "🔧"),
        };
        println!("{bar}{label} {}", turn.content.bright_white());
    }
    println!();

    match &outcome.status {
        LoopStatus::Completed => {
            let answer = outcome.final_answer.as_deref().unwrap_or("");
            println!(
                "{} {}",
                "✅ Completed:".bright_green().bold(),
                answer.bright_white()
            );
        }
        LoopStatus::Exhausted => {
            println!(
                "{} gave up after {} steps",
                "⏳ Exhausted:".bright_yellow().bold(),
                outcome.steps
            );
        }
        LoopStatus::Failed(reason) => {
            println!("{} {reason:?}", "❌ Failed:".bright_red().bold());
        }
    }
}

/// Scripts the backend side of the demo conversation: one turn that
/// fans out over the calculator and the clock, one turn that searches,
/// and a closing answer.
fn demo_backend() -> ScriptedBackend {
    ScriptedBackend::with_script([
        ScriptedTurn::with_events([
            ScriptEvent::Text(
                "I'll work out the math and check the clock first."
                    .to_owned(),
            ),
            ScriptEvent::ToolCall(ToolCallRequest {
                id: "tool:1".to_owned(),
                name: "calculate".to_owned(),
                arguments: json!({ "expression": "(2 + 3) * 4" }),
            }),
            ScriptEvent::ToolCall(ToolCallRequest {
                id: "tool:2".to_owned(),
                name: "get_current_time".to_owned(),
                arguments: json!({}),
            }),
        ]),
        ScriptedTurn::tool_call(ToolCallRequest {
            id: "tool:3".to_owned(),
            name: "search".to_owned(),
            arguments: json!({ "query": "capital of france" }),
        }),
        ScriptedTurn::text(
            "(2 + 3) * 4 is 20, the current UTC time is in the tool \
output above, and the capital of France is Paris.",
        ),
    ])
}
