//! CLI argument structures

use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Generate, analyze and deploy chaos-engineering scenarios
#[derive(Parser)]
#[command(name = "chaosforge")]
#[command(about = "chaosforge - Generate, analyze and deploy chaos-engineering scenarios", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace, -vvv for all)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one workflow execution from a template and wait for it
    Run {
        /// Template name under templates/ or a full template key
        template: String,

        /// Also run the Deploy step
        #[arg(long)]
        deploy: bool,

        /// Execution name (defaults to the workflow name plus a timestamp)
        #[arg(long)]
        name: Option<String>,

        /// Deploy parameter passed to the deploy commands, as KEY=VALUE
        #[arg(short = 'p', long = "param", value_name = "KEY=VALUE", value_parser = parse_key_val)]
        params: Vec<(String, String)>,
    },

    /// Show one execution record
    Status {
        execution_id: String,

        /// Print the full record as JSON
        #[arg(long)]
        json: bool,
    },

    /// List executions, newest first
    Executions {
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },

    /// Store a scenario template
    UploadTemplate {
        /// Template JSON file
        file: PathBuf,

        /// Template name (defaults to the file name)
        #[arg(long)]
        name: Option<String>,

        /// Overwrite an existing template with different content
        #[arg(long)]
        replace: bool,
    },

    /// Mirror an experiment record (with optional `logs` array) into the store
    ImportExperiment {
        /// Experiment JSON file
        file: PathBuf,
    },

    /// Build-deploy pipeline
    Pipeline {
        #[command(subcommand)]
        command: PipelineCommands,
    },

    /// Serve the status API
    Serve {
        /// Address to bind (overrides status.bind)
        #[arg(long)]
        bind: Option<SocketAddr>,
    },
}

#[derive(Subcommand)]
pub enum PipelineCommands {
    /// Run the pipeline once against the current source artifact
    RunOnce,

    /// Watch the trigger key and run on every new version
    Watch {
        /// Also run for the version present at startup
        #[arg(long)]
        run_existing: bool,
    },
}

pub fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", s))?;
    if key.is_empty() {
        return Err(format!("empty key in '{}'", s));
    }
    Ok((key.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_with_params() {
        let cli = Cli::try_parse_from([
            "chaosforge",
            "-vv",
            "run",
            "ec2-failure.json",
            "--deploy",
            "-p",
            "STAGE=dev",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Run {
                template,
                deploy,
                params,
                ..
            } => {
                assert_eq!(template, "ec2-failure.json");
                assert!(deploy);
                assert_eq!(params, vec![("STAGE".to_string(), "dev".to_string())]);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_parse_key_val() {
        assert_eq!(
            parse_key_val("A=b=c"),
            Ok(("A".to_string(), "b=c".to_string()))
        );
        assert!(parse_key_val("novalue").is_err());
        assert!(parse_key_val("=x").is_err());
    }
}
