//! Shape checks for submitted `mcpServers` documents.

use crate::error::ConfigError;
use crate::mcp::types::{Configuration, WorkerSpec};

use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;

/// Validate a configuration document and normalize it into a [`Configuration`].
///
/// Nothing is spawned here. Every entry must have a non-empty `command` and an
/// `args` array (which may be empty); `env` and `cwd` are optional.
pub fn validate(config: &Value) -> Result<Configuration, ConfigError> {
    let servers = config
        .get("mcpServers")
        .and_then(Value::as_object)
        .ok_or(ConfigError::MissingServers)?;

    if servers.is_empty() {
        return Err(ConfigError::NoServers);
    }

    let entries = servers
        .iter()
        .map(|(name, entry)| Ok((name.clone(), validate_entry(name, entry)?)))
        .collect::<Result<Vec<_>, ConfigError>>()?;

    Ok(Configuration::from_entries(entries))
}

fn validate_entry(name: &str, entry: &Value) -> Result<WorkerSpec, ConfigError> {
    let missing = || ConfigError::MissingCommandOrArgs {
        server: name.to_string(),
    };

    let command = entry
        .get("command")
        .and_then(Value::as_str)
        .filter(|command| !command.trim().is_empty())
        .ok_or_else(missing)?;

    let args = entry
        .get("args")
        .and_then(Value::as_array)
        .ok_or_else(missing)?
        .iter()
        .map(|arg| {
            arg.as_str().map(str::to_string).ok_or_else(|| ConfigError::NonStringArg {
                server: name.to_string(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let env = match entry.get("env") {
        None | Some(Value::Null) => HashMap::new(),
        Some(Value::Object(vars)) => vars
            .iter()
            .map(|(key, value)| {
                value
                    .as_str()
                    .map(|value| (key.clone(), value.to_string()))
                    .ok_or_else(|| ConfigError::InvalidEnv {
                        server: name.to_string(),
                    })
            })
            .collect::<Result<_, _>>()?,
        Some(_) => {
            return Err(ConfigError::InvalidEnv {
                server: name.to_string(),
            });
        }
    };

    let cwd = match entry.get("cwd") {
        None | Some(Value::Null) => None,
        Some(Value::String(path)) => Some(PathBuf::from(path)),
        Some(_) => {
            return Err(ConfigError::InvalidCwd {
                server: name.to_string(),
            });
        }
    };

    Ok(WorkerSpec {
        command: command.to_string(),
        args,
        env,
        cwd,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_minimal_config() {
        let config = validate(&json!({
            "mcpServers": {"fs": {"command": "node", "args": ["fs-server.js"]}}
        }))
        .unwrap();

        assert_eq!(config.len(), 1);
        let (name, spec) = config.first();
        assert_eq!(name, "fs");
        assert_eq!(spec.command, "node");
        assert_eq!(spec.args, ["fs-server.js"]);
        assert!(spec.env.is_empty());
        assert!(spec.cwd.is_none());
    }

    #[test]
    fn empty_args_are_allowed() {
        let config = validate(&json!({
            "mcpServers": {"bare": {"command": "server", "args": []}}
        }))
        .unwrap();
        assert!(config.first().1.args.is_empty());
    }

    #[test]
    fn preserves_document_order() {
        let document: Value = serde_json::from_str(
            r#"{"mcpServers": {
                "zulu": {"command": "z", "args": []},
                "alpha": {"command": "a", "args": []},
                "mike": {"command": "m", "args": []}
            }}"#,
        )
        .unwrap();

        let config = validate(&document).unwrap();
        assert_eq!(config.names().collect::<Vec<_>>(), ["zulu", "alpha", "mike"]);
    }

    #[test]
    fn rejects_missing_server_map() {
        assert_eq!(validate(&Value::Null), Err(ConfigError::MissingServers));
        assert_eq!(validate(&json!({})), Err(ConfigError::MissingServers));
        assert_eq!(
            validate(&json!({"mcpServers": ["not", "a", "map"]})),
            Err(ConfigError::MissingServers)
        );
    }

    #[test]
    fn rejects_empty_server_map() {
        assert_eq!(
            validate(&json!({"mcpServers": {}})),
            Err(ConfigError::NoServers)
        );
    }

    #[test]
    fn rejects_missing_or_scalar_args_naming_the_server() {
        for entry in [
            json!({"command": "node"}),
            json!({"command": "node", "args": "fs-server.js"}),
            json!({"command": "node", "args": null}),
        ] {
            let error = validate(&json!({
                "mcpServers": {
                    "good": {"command": "node", "args": []},
                    "broken": entry,
                }
            }))
            .unwrap_err();

            assert_eq!(
                error,
                ConfigError::MissingCommandOrArgs {
                    server: "broken".into()
                }
            );
            assert!(error.to_string().contains("broken"));
        }
    }

    #[test]
    fn rejects_empty_command() {
        let error = validate(&json!({
            "mcpServers": {"fs": {"command": "  ", "args": []}}
        }))
        .unwrap_err();
        assert_eq!(error.server(), Some("fs"));
    }

    #[test]
    fn rejects_non_string_args() {
        let error = validate(&json!({
            "mcpServers": {"fs": {"command": "node", "args": ["a", 3]}}
        }))
        .unwrap_err();
        assert_eq!(error, ConfigError::NonStringArg { server: "fs".into() });
    }

    #[test]
    fn parses_env_and_cwd() {
        let config = validate(&json!({
            "mcpServers": {"fs": {
                "command": "node",
                "args": [],
                "env": {"API_KEY": "secret"},
                "cwd": "/srv/fs"
            }}
        }))
        .unwrap();

        let spec = config.first().1;
        assert_eq!(spec.env.get("API_KEY").map(String::as_str), Some("secret"));
        assert_eq!(spec.cwd, Some(PathBuf::from("/srv/fs")));
    }

    #[test]
    fn rejects_malformed_env_and_cwd() {
        let error = validate(&json!({
            "mcpServers": {"fs": {"command": "node", "args": [], "env": {"PORT": 8080}}}
        }))
        .unwrap_err();
        assert_eq!(error, ConfigError::InvalidEnv { server: "fs".into() });

        let error = validate(&json!({
            "mcpServers": {"fs": {"command": "node", "args": [], "cwd": 7}}
        }))
        .unwrap_err();
        assert_eq!(error, ConfigError::InvalidCwd { server: "fs".into() });
    }
}
