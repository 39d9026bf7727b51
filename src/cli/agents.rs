use crate::agents::{Agent, AgentNode, AgentStatus};
use crate::config::StewardConfig;
use crate::context::StewardContext;
use crate::error::Result;

use super::AgentsCommand;

pub async fn run_agents(config: StewardConfig, command: AgentsCommand) -> Result<()> {
    let ctx = StewardContext::open(config)?;

    match command {
        AgentsCommand::List { status } => {
            let agents = match status {
                Some(s) => match s.parse::<AgentStatus>() {
                    Ok(status) => ctx.agents.agents_with_status(status)?,
                    Err(e) => {
                        eprintln!("steward: {}", e);
                        std::process::exit(2);
                    }
                },
                None => ctx.agents.list_agents()?,
            };
            if agents.is_empty() {
                println!("No agents.");
                return Ok(());
            }
            for agent in &agents {
                println!("{}", summary(agent));
            }
        }
        AgentsCommand::Tree => {
            let forest = ctx.agents.forest()?;
            if forest.is_empty() {
                println!("No agents.");
                return Ok(());
            }
            let mut out = String::new();
            for root in &forest {
                render(root, 0, &mut out);
            }
            print!("{}", out);
        }
    }
    Ok(())
}

fn summary(agent: &Agent) -> String {
    format!(
        "{}  {:<10}  {}  (last active {})",
        agent.id,
        agent.status.to_string(),
        agent.name,
        agent.last_activity.format("%Y-%m-%d %H:%M:%S"),
    )
}

fn render(node: &AgentNode, depth: usize, out: &mut String) {
    out.push_str(&"  ".repeat(depth));
    out.push_str(&summary(&node.agent));
    out.push('\n');
    for child in &node.children {
        render(child, depth + 1, out);
    }
}
