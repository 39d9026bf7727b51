use globset::{GlobBuilder, GlobMatcher};

use super::PermissionRequest;

/// Parsed form of a policy's matcher string.
///
/// Forms are tried in order and the first structural form that applies wins:
///
/// | Matcher           | Matches                                                   |
/// |-------------------|-----------------------------------------------------------|
/// | `*`               | any request                                               |
/// | `Tool(pattern)`   | tool name equals `Tool` and file path or command globs    |
/// | `file:glob`       | file path only                                            |
/// | `permission:name` | permission type only                                      |
/// | `word`            | tool name; permission type when the tool name is absent   |
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Matcher {
    Any,
    ToolScoped { tool: String, pattern: String },
    File(String),
    Permission(String),
    Bare(String),
}

impl Matcher {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();

        if raw == "*" {
            return Matcher::Any;
        }

        if let Some((tool, pattern)) = split_tool_scope(raw) {
            return Matcher::ToolScoped {
                tool: tool.to_string(),
                pattern: pattern.to_string(),
            };
        }

        if let Some(glob) = raw.strip_prefix("file:") {
            return Matcher::File(glob.to_string());
        }

        if let Some(name) = raw.strip_prefix("permission:") {
            return Matcher::Permission(name.to_string());
        }

        Matcher::Bare(raw.to_string())
    }

    pub fn matches(&self, request: &PermissionRequest) -> bool {
        match self {
            Matcher::Any => true,
            Matcher::ToolScoped { tool, pattern } => {
                if request.tool_name.as_deref() != Some(tool.as_str()) {
                    return false;
                }
                let path_hit = request
                    .file_path
                    .as_deref()
                    .is_some_and(|p| path_glob_matches(pattern, p));
                let command_hit = request
                    .command
                    .as_deref()
                    .is_some_and(|c| command_glob_matches(pattern, c));
                path_hit || command_hit
            }
            Matcher::File(glob) => request
                .file_path
                .as_deref()
                .is_some_and(|p| path_glob_matches(glob, p)),
            Matcher::Permission(name) => request.permission_type.as_deref() == Some(name.as_str()),
            // Asymmetric on purpose: the permission type is only consulted when
            // there is no tool name at all.
            Matcher::Bare(word) => match request.tool_name.as_deref() {
                Some(tool) => tool == word,
                None => request.permission_type.as_deref() == Some(word.as_str()),
            },
        }
    }
}

/// `Tool(pattern)` -> `("Tool", "pattern")`.
fn split_tool_scope(raw: &str) -> Option<(&str, &str)> {
    let inner = raw.strip_suffix(')')?;
    let open = inner.find('(')?;
    let tool = &inner[..open];
    if tool.is_empty() || !tool.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-') {
        return None;
    }
    Some((tool, &inner[open + 1..]))
}

/// Glob match for file paths: `*` stays within one path segment, `**` crosses.
pub fn path_glob_matches(pattern: &str, path: &str) -> bool {
    match compile(pattern, true) {
        Some(m) => m.is_match(path),
        None => false,
    }
}

/// Glob match for shell commands, where `/` is an ordinary character.
pub fn command_glob_matches(pattern: &str, command: &str) -> bool {
    match compile(pattern, false) {
        Some(m) => m.is_match(command),
        None => false,
    }
}

fn compile(pattern: &str, literal_separator: bool) -> Option<GlobMatcher> {
    match GlobBuilder::new(pattern)
        .literal_separator(literal_separator)
        .build()
    {
        Ok(glob) => Some(glob.compile_matcher()),
        Err(e) => {
            tracing::warn!("ignoring invalid glob pattern '{}': {}", pattern, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_forms() {
        assert_eq!(Matcher::parse("*"), Matcher::Any);
        assert_eq!(
            Matcher::parse("Bash(npm *)"),
            Matcher::ToolScoped {
                tool: "Bash".into(),
                pattern: "npm *".into()
            }
        );
        assert_eq!(Matcher::parse("file:src/**"), Matcher::File("src/**".into()));
        assert_eq!(
            Matcher::parse("permission:network"),
            Matcher::Permission("network".into())
        );
        assert_eq!(Matcher::parse("Read"), Matcher::Bare("Read".into()));
    }

    #[test]
    fn test_parenthesised_without_tool_is_bare() {
        assert_eq!(Matcher::parse("(x)"), Matcher::Bare("(x)".into()));
    }

    #[test]
    fn test_invalid_glob_never_matches() {
        assert!(!path_glob_matches("[invalid", "[invalid"));
    }
}
