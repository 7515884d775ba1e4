// src/core/system_prompt.rs — Assembles an agent's system prompt from protocol, tools, edges and role

use super::types::{Agent, Team, TeamEdge};
use crate::tools::ToolRegistry;

/// Build the system prompt for one agent activation.
///
/// Sections (in order):
///   1. Tool-calling protocol
///   2. Tool catalogue — defaults plus the agent's own tools
///   3. Delegation — outgoing edges only, or a note that there are none
///   4. Wrapping up — delegate or finish
///   5. Role — the agent's own instructions
pub fn build_agent_prompt(agent: &Agent, team: &Team, tools: &ToolRegistry) -> String {
    let mut prompt = String::with_capacity(4096);

    append_protocol_section(&mut prompt);
    append_tools_section(&mut prompt, agent, tools);

    let edges: Vec<&TeamEdge> = team.neighbors(&agent.id).collect();
    append_delegation_section(&mut prompt, &edges);
    append_wrap_up_section(&mut prompt, !edges.is_empty());

    prompt.push_str("# Role\n\n");
    prompt.push_str(agent.system_prompt.trim());
    prompt.push('\n');

    prompt
}

/// Build the first user message: the task plus what earlier agents produced.
pub fn build_task_message(
    task: &str,
    previous_outputs: &[(String, String)],
    workspace_tree: &str,
) -> String {
    let mut msg = String::with_capacity(task.len() + 512);

    if !previous_outputs.is_empty() {
        msg.push_str("## Work so far\n\n");
        for (agent_name, output) in previous_outputs {
            msg.push_str(&format!("### {}\n{}\n\n", agent_name, output.trim()));
        }
    }

    if !workspace_tree.is_empty() {
        msg.push_str("## Project files\n\n```\n");
        msg.push_str(workspace_tree);
        msg.push_str("```\n\n");
    }

    msg.push_str("## Your task\n\n");
    msg.push_str(task.trim());
    msg
}

// ─── Section builders ───────────────────────────────────────────────────────

fn append_protocol_section(prompt: &mut String) {
    prompt.push_str(
        "# Tool calling\n\n\
         To use a tool, write a block in exactly this form:\n\n\
         BEGIN_TOOL_CALL <tool_name>\n\
         BEGIN_ARG <argument_name>\n\
         <argument value, may span lines>\n\
         END_ARG\n\
         END_TOOL_CALL\n\n\
         Repeat BEGIN_ARG/END_ARG for each argument. If a value itself contains \
         END_ARG lines, wrap it in lines holding only \"\"\". You may issue several \
         tool calls in one response; results come back in the next message as \
         [TOOL RESULT: name] blocks.\n\n\
         Files only exist if you write them with a file tool. Do not paste file \
         contents into chat instead.\n\n",
    );
}

fn append_tools_section(prompt: &mut String, agent: &Agent, tools: &ToolRegistry) {
    prompt.push_str("# Available tools\n\n");
    for tool in tools.catalogue_for(agent) {
        prompt.push_str(&format!("- {}: {}\n", tool.signature(), tool.description));
    }
    prompt.push('\n');
}

fn append_delegation_section(prompt: &mut String, edges: &[&TeamEdge]) {
    prompt.push_str("# Delegation\n\n");
    if edges.is_empty() {
        prompt.push_str("You cannot delegate. Complete the task yourself.\n\n");
        return;
    }
    prompt.push_str(
        "To hand work to a team member, write:\n\n\
         [DELEGATE: agent_id]\n\
         Task description for that agent\n\n\
         Once you delegate your turn is over. You may delegate to:\n",
    );
    for edge in edges {
        match &edge.description {
            Some(desc) if !desc.is_empty() => {
                prompt.push_str(&format!("- {}: {}\n", edge.to, desc));
            }
            _ => prompt.push_str(&format!("- {}\n", edge.to)),
        }
    }
    prompt.push('\n');
}

fn append_wrap_up_section(prompt: &mut String, can_delegate: bool) {
    prompt.push_str("# Wrapping up\n\n");
    if can_delegate {
        prompt.push_str(
            "End your turn by delegating with [DELEGATE: agent_id] or by writing \
             <FINISHED> when the whole task is complete.\n\n",
        );
    } else {
        prompt.push_str("When your work is complete, write <FINISHED>.\n\n");
    }
}
