//! ---
//! nodeiam_section: "05-networking-external-interfaces"
//! nodeiam_subsection: "binary"
//! nodeiam_type: "source"
//! nodeiam_scope: "code"
//! nodeiam_description: "Control CLI for planning node instance roles."
//! nodeiam_version: "v0.0.0-prealpha"
//! nodeiam_owner: "tbd"
//! ---
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Args, ValueEnum};
use nodeiam_common::{init_tracing, NodeGroupKind, RoleRequest};
use nodeiam_core::{create_role, resolve_managed_policies, InMemoryTemplate};
use tracing::debug;

const DEFAULT_REQUEST_PATH: &str = "nodeiam.toml";

/// Options shared by every command that reads a role request.
#[derive(Debug, Args)]
pub struct RequestOptions {
    /// Role request file (TOML). NODEIAM_CONFIG takes precedence when set.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Treat the node group as a managed node group.
    #[arg(long, action = ArgAction::SetTrue)]
    pub managed: bool,

    /// Attach the SSM managed instance core policy.
    #[arg(long = "enable-ssm", action = ArgAction::SetTrue)]
    pub enable_ssm: bool,
}

#[derive(Debug, Args)]
pub struct PlanCommand {
    #[command(flatten)]
    request: RequestOptions,

    /// Rendering of the recorded template.
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    output: OutputFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Yaml,
}

fn load_request(options: &RequestOptions) -> Result<RoleRequest> {
    let candidates = match &options.config {
        Some(path) => vec![path.clone()],
        None => vec![PathBuf::from(DEFAULT_REQUEST_PATH)],
    };
    let loaded = RoleRequest::load_with_source(&candidates)?;
    let mut request = loaded.request;

    init_tracing(env!("CARGO_PKG_NAME"), &request.logging)?;
    debug!(source = %loaded.source.display(), "role request loaded");

    if options.managed {
        request.kind = NodeGroupKind::Managed;
    }
    if options.enable_ssm {
        request.enable_ssm = true;
    }
    Ok(request)
}

/// Assemble the role into an in-memory template and print it.
pub fn run_plan(command: PlanCommand) -> Result<()> {
    let request = load_request(&command.request)?;
    let mut template = InMemoryTemplate::new(request.partition);
    create_role(
        &mut template,
        &request.cluster,
        &request.node_group,
        request.kind,
        request.enable_ssm,
        None,
    )
    .context("unable to assemble node instance role")?;

    let rendered = match command.output {
        OutputFormat::Json => template.to_json()?,
        OutputFormat::Yaml => template.to_yaml()?,
    };
    println!("{}", rendered);
    Ok(())
}

/// Print the managed policy ARNs the role would carry.
pub fn run_managed_policies(options: RequestOptions) -> Result<()> {
    let request = load_request(&options)?;
    let resolved = resolve_managed_policies(
        &request.cluster,
        &request.node_group,
        request.kind,
        request.enable_ssm,
    )
    .context("unable to resolve managed policies")?;
    for arn in resolved.to_arns(request.partition) {
        println!("{}", arn);
    }
    Ok(())
}
