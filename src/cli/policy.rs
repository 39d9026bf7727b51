use crate::config::StewardConfig;
use crate::context::StewardContext;
use crate::error::{Result, StewardError};
use crate::policy::{NewPolicy, PolicyAction, PolicyUpdate};

use super::PolicyCommand;

pub async fn run_policy(config: StewardConfig, command: PolicyCommand) -> Result<()> {
    let ctx = StewardContext::open(config)?;
    let engine = &ctx.policies;

    match command {
        PolicyCommand::List => {
            let policies = engine.get_all_policies()?;
            if policies.is_empty() {
                println!("No policies.");
                return Ok(());
            }
            let mut sorted = policies;
            sorted.sort_by(|a, b| b.priority.cmp(&a.priority));
            for p in &sorted {
                println!(
                    "{}  [{}] {:>6}  {:<12}  {}  ({})",
                    p.id,
                    if p.enabled { "on " } else { "off" },
                    p.priority,
                    p.action.to_string(),
                    p.name,
                    p.matcher,
                );
            }
            println!("{} policies", sorted.len());
        }
        PolicyCommand::Add {
            name,
            matcher,
            action,
            priority,
            conditions,
            disabled,
        } => {
            let action: PolicyAction = action
                .parse()
                .map_err(|reason| StewardError::InvalidPolicy { reason })?;
            let mut new = NewPolicy::new(&name, &matcher, action, priority);
            if let Some(raw) = conditions {
                let value = serde_json::from_str(&raw).map_err(|e| StewardError::InvalidPolicy {
                    reason: format!("conditions are not valid JSON: {}", e),
                })?;
                new = new.with_conditions(value);
            }
            if disabled {
                new = new.disabled();
            }
            let policy = engine.create_policy(new)?;
            eprintln!("steward: created policy {} ({})", policy.id, policy.name);
            println!("{}", policy.id);
        }
        PolicyCommand::Enable { id } => {
            set_enabled(&ctx, &id, true)?;
            eprintln!("steward: enabled policy {}", id);
        }
        PolicyCommand::Disable { id } => {
            set_enabled(&ctx, &id, false)?;
            eprintln!("steward: disabled policy {}", id);
        }
        PolicyCommand::Remove { id } => {
            engine.delete_policy(&id)?;
            eprintln!("steward: removed policy {}", id);
        }
        PolicyCommand::InstallDefaults => {
            let installed = engine.install_default_policies()?;
            eprintln!("steward: installed {} default policies", installed);
        }
    }
    Ok(())
}

fn set_enabled(ctx: &StewardContext, id: &str, enabled: bool) -> Result<()> {
    ctx.policies.update_policy(
        id,
        PolicyUpdate {
            enabled: Some(enabled),
            ..Default::default()
        },
    )?;
    Ok(())
}
