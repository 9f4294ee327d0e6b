//! nginx-config-builder
//!
//! Turns a per-application YAML document into nginx configuration and
//! publishes it as a versioned release.
//!
//! ```text
//!   app.yml ──▶ config ──▶ template ──▶ directives ──▶ release
//!              (validate)  (resolve)    (generate)    (stage, publish,
//!                                                      nginx -t, rollback)
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use nginx_config_builder::config::settings::{parse_listeners, parse_ports};
use nginx_config_builder::config::{parse_and_validate, BuildSettings, SettingsError};
use nginx_config_builder::observability::logging;
use nginx_config_builder::release::CommandChecker;
use nginx_config_builder::template::{query, Node};
use nginx_config_builder::Pipeline;

#[derive(Parser)]
#[command(name = "nginx-config-builder")]
#[command(about = "Build and publish nginx configuration for an app", long_about = None)]
struct Cli {
    /// Build settings file (TOML)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[arg(long, env = "APP_NAME", global = true)]
    app_name: Option<String>,

    /// Space separated `host:port` listeners of the app
    #[arg(long, env = "DOKKU_APP_LISTENERS", global = true)]
    listeners: Option<String>,

    /// Space separated ports that get a default upstream
    #[arg(long, env = "PROXY_UPSTREAM_PORTS", global = true)]
    upstream_ports: Option<String>,

    /// App working directory; releases are written to `<dir>/conf.d`
    #[arg(long, env = "NGINX_CONF_WORKDIR", global = true)]
    working_dir: Option<PathBuf>,

    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse and validate a document
    Validate {
        #[arg(long)]
        config_file: PathBuf,
    },
    /// Print every generated fragment without writing anything
    Render {
        #[arg(long)]
        config_file: PathBuf,
    },
    /// Generate, publish and check a new release
    Deploy {
        #[arg(long)]
        config_file: PathBuf,
    },
    /// Run a JMESPath query, e.g. `vhosts[*].server_name`
    Query {
        #[arg(long)]
        config_file: PathBuf,

        /// Resolve templates before querying
        #[arg(long)]
        resolved: bool,

        /// JMESPath expression; `@` is the whole document
        #[arg(default_value = "@")]
        expression: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let settings = build_settings(&cli)?;

    match cli.command {
        Commands::Validate { config_file } => {
            parse_and_validate(&read(&config_file)?)?;
            println!("{}: ok", config_file.display());
        }
        Commands::Render { config_file } => {
            let compiled = Pipeline::new(settings).compile(&read(&config_file)?)?;
            for fragment in &compiled.fragments {
                println!("# {}", fragment.path.display());
                print!("{}", fragment.contents);
                println!();
            }
        }
        Commands::Deploy { config_file } => {
            let checker = CommandChecker::from_argv(&settings.release.check_command)
                .ok_or(SettingsError::Missing("release.check_command"))?;
            let pipeline = Pipeline::new(settings);
            let manager = pipeline.release_manager();
            let release = pipeline.deploy(&read(&config_file)?, &manager, &checker)?;
            println!("{}", release.display());
        }
        Commands::Query {
            config_file,
            resolved,
            expression,
        } => {
            let bytes = read(&config_file)?;
            let document = if resolved {
                Pipeline::new(settings).resolve(&bytes)?.1
            } else {
                Node::parse(&bytes)?
            };
            let result = query(&document, &expression)?;
            print!("{}", serde_yaml::to_string(&result)?);
        }
    }
    Ok(())
}

/// Settings file first, then flags / environment on top.
fn build_settings(cli: &Cli) -> Result<BuildSettings, SettingsError> {
    let mut settings = match &cli.settings {
        Some(path) => BuildSettings::load(path)?,
        None => BuildSettings::default(),
    };
    if let Some(name) = &cli.app_name {
        settings.app_name = name.clone();
    }
    if let Some(raw) = &cli.listeners {
        settings.listeners = parse_listeners(raw);
    }
    if let Some(raw) = &cli.upstream_ports {
        settings.upstream_ports = parse_ports(raw)?;
    }
    if let Some(dir) = &cli.working_dir {
        settings.release.working_dir = dir.clone();
    }
    Ok(settings)
}

fn read(path: &Path) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    fs::read(path).map_err(|e| format!("failed to read {}: {}", path.display(), e).into())
}
