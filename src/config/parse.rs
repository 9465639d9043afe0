use super::types::Config;
use crate::config::{expand_env_vars, expand_tilde, unexpanded_env_vars};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation failed:\n{}", .0.join("\n"))]
    ValidationList(Vec<String>),

    #[error("validation failed: {0}")]
    Validation(String),
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let yaml_string = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_config(&yaml_string)
}

/// Parse a config document: expand `$env{...}`, deserialize, expand `~` in
/// paths, then validate.
pub fn parse_config(yaml: &str) -> Result<Config, ConfigError> {
    let yaml_string = expand_env_vars(yaml);
    check_unexpanded_vars(&yaml_string)?;

    // An empty or comment-only file means "all defaults".
    let mut config: Config = if yaml_string.lines().all(|l| l.trim().is_empty() || l.trim_start().starts_with('#')) {
        Config::default()
    } else {
        serde_yaml::from_str(&yaml_string)?
    };

    expand_paths(&mut config);
    validate_config(&config)?;

    Ok(config)
}

fn check_unexpanded_vars(yaml_string: &str) -> Result<(), ConfigError> {
    // Comment lines never reach the parser.
    let active: String = yaml_string
        .lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .collect::<Vec<_>>()
        .join("\n");
    let unexpanded = unexpanded_env_vars(&active);
    if unexpanded.is_empty() {
        return Ok(());
    }

    let error_msg = if unexpanded.len() == 1 {
        format!(
            "Environment variable $env{{{0}}} is not set.\n\
             \n\
             To fix this, either:\n\
             1. Set the environment variable: export {0}=/path/to/directory\n\
             2. Replace $env{{{0}}} in the config file with an actual path",
            unexpanded[0]
        )
    } else {
        format!(
            "Environment variables are not set: {}\n\
             \n\
             Set them, or replace the references in the config file with actual paths",
            unexpanded.join(", ")
        )
    };

    Err(ConfigError::Validation(error_msg))
}

fn expand_paths(config: &mut Config) {
    if let Some(path) = &config.settings_path {
        config.settings_path = Some(expand_tilde(path));
    }

    for dirs in config.products.values_mut() {
        for dir in dirs.iter_mut() {
            *dir = expand_tilde(dir);
        }
    }
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    let intervals = [
        ("monitor.interval", config.monitor.interval),
        ("connection.health_check_interval", config.connection.health_check_interval),
        ("connection.retry_interval", config.connection.retry_interval),
        ("connection.health_timeout", config.connection.health_timeout),
        ("connection.request_timeout", config.connection.request_timeout),
    ];
    for (name, value) in intervals {
        if value.is_zero() {
            errors.push(format!("{} must be greater than zero", name));
        }
    }

    if config.monitor.file_marker.is_empty() {
        errors.push("monitor.file_marker must not be empty".to_string());
    }
    if config.monitor.file_extension.is_empty() {
        errors.push("monitor.file_extension must not be empty".to_string());
    } else if config.monitor.file_extension.starts_with('.') {
        errors.push("monitor.file_extension is given without the leading dot".to_string());
    }

    for (product, dirs) in &config.products {
        if dirs.is_empty() {
            errors.push(format!("products.{} lists no directories", product));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationList(errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::product::Product;
    use std::io::Write;
    use std::path::PathBuf;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    #[test]
    fn test_empty_document_is_default() {
        let config = parse_config("# nothing here\n\n").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_durations_and_products() {
        let yaml = r#"
settings_path: /var/lib/logbridge/settings.json
monitor:
  interval: 10s
connection:
  settle_delay: 500ms
  request_timeout: 1m
products:
  MD_CLOUD:
    - /data/cloud/Log
"#;
        let config = parse_config(yaml).unwrap();

        assert_eq!(config.monitor.interval, Duration::from_secs(10));
        assert_eq!(config.monitor.file_marker, "_monitor");
        assert_eq!(config.connection.settle_delay, Duration::from_millis(500));
        assert_eq!(config.connection.request_timeout, Duration::from_secs(60));
        assert_eq!(config.connection.health_timeout, Duration::from_secs(2));
        assert_eq!(config.settings_path(), PathBuf::from("/var/lib/logbridge/settings.json"));

        let dirs = config.product_directories_under(Path::new("/base"));
        assert_eq!(dirs[&Product::MdCloud], vec![PathBuf::from("/data/cloud/Log")]);
        assert_eq!(
            dirs[&Product::MdVideo],
            vec![
                PathBuf::from("/base/MD-Series/MD-MEDIA/Log"),
                PathBuf::from("/base/MD-Series/MD-VIDEO/Log"),
            ]
        );
    }

    #[test]
    fn test_env_expansion_in_paths() {
        std::env::set_var("LOGBRIDGE_PARSE_ROOT", "/srv/agent");
        let config = parse_config("settings_path: $env{LOGBRIDGE_PARSE_ROOT}/settings.json\n").unwrap();
        std::env::remove_var("LOGBRIDGE_PARSE_ROOT");

        assert_eq!(config.settings_path(), PathBuf::from("/srv/agent/settings.json"));
    }

    #[test]
    fn test_unset_env_var_is_reported() {
        let err = parse_config("settings_path: $env{LOGBRIDGE_PARSE_MISSING}/s.json\n").unwrap_err();
        assert!(err.to_string().contains("LOGBRIDGE_PARSE_MISSING"));
    }

    #[test]
    fn test_env_reference_in_comment_is_ignored() {
        let yaml = "# settings_path: $env{LOGBRIDGE_PARSE_COMMENTED}/s.json\nmonitor:\n  interval: 7s\n";
        let config = parse_config(yaml).unwrap();
        assert_eq!(config.monitor.interval, Duration::from_secs(7));
    }

    #[test]
    fn test_validation_collects_all_errors() {
        let yaml = r#"
monitor:
  interval: 0s
  file_marker: ""
  file_extension: .log
products:
  MD_LIVE: []
"#;
        match parse_config(yaml).unwrap_err() {
            ConfigError::ValidationList(errors) => assert_eq!(errors.len(), 4),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_unknown_fields_and_products_rejected() {
        assert!(matches!(
            parse_config("monitor:\n  intervall: 5s\n"),
            Err(ConfigError::YamlParse(_))
        ));
        assert!(matches!(
            parse_config("products:\n  MD_UNKNOWN: [/x]\n"),
            Err(ConfigError::YamlParse(_))
        ));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "monitor:\n  interval: 3s").unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.monitor.interval, Duration::from_secs(3));

        assert!(matches!(
            load_config(Path::new("/definitely/not/here.yml")),
            Err(ConfigError::Io { .. })
        ));
    }
}
