use std::fs;
use std::path::PathBuf;

const SAMPLE_CONFIG: &str = r#"# cronwatch configuration
#
# Path of the append-only JSONL log written by the cron job wrapper.
source: ~/logs/jobs.jsonl

# Directory holding the record database and the read cursor.
data_dir: ~/.cronwatch

ingest:
  # How often the source log is polled for new lines.
  check_interval: 30s
  # How often aggregate statistics are recomputed and cached.
  stats_interval: 5m

web:
  enabled: true
  listen: 127.0.0.1:5001

notify:
  enabled: true
  # Invoked as: <command> -u <urgency> <title> <body>
  command: notify-send
"#;

pub fn init(stdout: bool) -> Result<(), Box<dyn std::error::Error>> {
    write_config(SAMPLE_CONFIG, stdout)
}

fn write_config(config_content: &str, stdout: bool) -> Result<(), Box<dyn std::error::Error>> {
    if stdout {
        print!("{}", config_content);
        return Ok(());
    }

    // Try to write to ~/.config/cronwatch/config.yml first
    let config_path = if let Some(home_dir) = dirs::home_dir() {
        let user_config = home_dir.join(".config/cronwatch/config.yml");

        match user_config.parent() {
            Some(parent) => match fs::create_dir_all(parent) {
                Ok(_) => Some(user_config),
                Err(_) => {
                    // Fall back to /etc/cronwatch/config.yml
                    eprintln!("Warning: Could not create directory {}", parent.display());
                    eprintln!("Falling back to /etc/cronwatch/config.yml");
                    None
                }
            },
            None => None,
        }
    } else {
        None
    };

    let config_path = config_path.unwrap_or_else(|| PathBuf::from("/etc/cronwatch/config.yml"));

    if config_path.exists() {
        eprintln!(
            "Error: Config file already exists at {}",
            config_path.display()
        );
        eprintln!("Remove it first or use --stdout to print the config");
        std::process::exit(1);
    }

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)?;
    }

    fs::write(&config_path, config_content)?;

    println!("Config file written to {}", config_path.display());
    Ok(())
}
