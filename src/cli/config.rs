use crate::config::generate::generate_starter_config;
use std::fs;
use std::path::PathBuf;

pub fn init(stdout: bool) -> Result<(), Box<dyn std::error::Error>> {
    write_config(&generate_starter_config(), stdout)
}

fn write_config(config_content: &str, stdout: bool) -> Result<(), Box<dyn std::error::Error>> {
    if stdout {
        print!("{}", config_content);
        return Ok(());
    }

    // Prefer ~/.config/logbridge/config.yml, fall back to /etc/logbridge/config.yml
    let config_path = match dirs::home_dir() {
        Some(home_dir) => {
            let user_config = home_dir.join(".config/logbridge/config.yml");
            match user_config.parent().map(fs::create_dir_all) {
                Some(Ok(())) => user_config,
                _ => {
                    eprintln!("Warning: Could not create {}", user_config.display());
                    eprintln!("Falling back to /etc/logbridge/config.yml");
                    PathBuf::from("/etc/logbridge/config.yml")
                }
            }
        }
        None => PathBuf::from("/etc/logbridge/config.yml"),
    };

    if config_path.exists() {
        return Err(format!(
            "config file already exists at {}; remove it first or use --stdout",
            config_path.display()
        )
        .into());
    }

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&config_path, config_content)?;

    println!("Config file written to {}", config_path.display());
    Ok(())
}
