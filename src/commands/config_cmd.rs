use clap::{Args, Subcommand};

use super::OutputFormat;
use crate::config::{Config, ConfigValue};

#[derive(Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub command: ConfigSubcommand,
}

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Show current configuration values
    Show {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

fn print_value<T: std::fmt::Display>(name: &str, value: &ConfigValue<T>) {
    println!("{}: {}", name, value.value);
    println!("  source: {}", value.source);
    println!();
}

impl ConfigCommand {
    pub fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            ConfigSubcommand::Show { format } => {
                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(config)?);
                    }
                    OutputFormat::Text => {
                        println!("Configuration");
                        println!("=============\n");

                        if let Some(path) = &config.config_file {
                            println!("Config file: {}", path.display());
                        } else {
                            println!(
                                "Config file: {} (not found)",
                                Config::default_config_path().display()
                            );
                        }
                        println!();

                        println!(
                            "database_path: {}",
                            config.database_path.value.display()
                        );
                        println!("  source: {}", config.database_path.source);
                        println!();

                        println!(
                            "remote.store_path: {}",
                            config.remote.store_path.value.display()
                        );
                        println!("  source: {}", config.remote.store_path.source);
                        println!();

                        print_value("remote.offline", &config.remote.offline);

                        println!(
                            "remote.probe_url: {}",
                            config.remote.probe_url.as_deref().unwrap_or("(none)")
                        );
                        println!(
                            "user.uid: {}",
                            config.user.uid.as_deref().unwrap_or("(signed out)")
                        );
                        println!(
                            "user.display_name: {}",
                            config.user.display_name.as_deref().unwrap_or("(none)")
                        );
                    }
                }
                Ok(())
            }
        }
    }
}
