use super::{NewPolicy, PolicyAction};

/// Read-only tools that never modify the workspace.
const SAFE_READ_TOOLS: &[&str] = &["Read", "Glob", "Grep", "LS"];

/// File patterns that must never be touched without an explicit policy.
const SENSITIVE_FILES: &[(&str, &str)] = &[
    ("Deny environment files", "file:**/.env*"),
    ("Deny private keys", "file:**/*.pem"),
    ("Deny SSH keys", "file:**/id_rsa*"),
    ("Deny secrets directories", "file:**/secrets/**"),
];

/// The built-in policy set. Sensitive-file denials outrank the read-only
/// approvals, so reading `.env` is still denied.
pub fn default_policies() -> Vec<NewPolicy> {
    let mut policies: Vec<NewPolicy> = SENSITIVE_FILES
        .iter()
        .map(|(name, matcher)| NewPolicy::new(name, matcher, PolicyAction::AutoDeny, 1000))
        .collect();

    policies.extend(SAFE_READ_TOOLS.iter().map(|tool| {
        NewPolicy::new(&format!("Allow {tool}"), tool, PolicyAction::AutoApprove, 100)
    }));

    policies
}
