//! `rd api <fork|merge> <id> --token <t>`: call an editor endpoint.
//!
//! Runs the same token check and engine call a remote editor would trigger
//! and prints the endpoint's response object. Failures print the endpoint's
//! error payload instead of the engine error, so store detail stays in the
//! logs.

use crate::cmd::project::{Project, parse_id};
use crate::output::{CliError, OutputMode, fail, render};
use clap::Args;
use redraft_core::api::{EndpointAction, EndpointError, Endpoints, ForkRequest};
use redraft_core::events::TracingObserver;
use std::io::Write;
use std::path::Path;

#[derive(Args, Debug)]
pub struct ApiArgs {
    /// Endpoint to call: `fork` (create fork) or `merge` (merge fork).
    pub action: EndpointAction,

    /// Document ID sent in the request.
    pub id: String,

    /// Request token from `rd token`.
    #[arg(long)]
    pub token: String,
}

fn endpoint_failure(output: OutputMode, err: &EndpointError) -> anyhow::Error {
    let response = err.to_response();
    tracing::debug!(status = response.status, code = response.code, "endpoint returned an error");
    fail(
        output,
        &CliError {
            message: response.message,
            suggestion: response.hint.map(str::to_string),
            error_code: Some(response.code.to_string()),
        },
    )
}

pub fn run_api(args: &ApiArgs, output: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    let id = parse_id(&args.id, output)?;
    let project = Project::open(project_root, output)?;
    let _lock = project.write_lock(output)?;
    let verifier = project.config.token_verifier(&project.paths)?;

    let endpoints = Endpoints::new(project.trigger(&TracingObserver), &verifier);
    let request = ForkRequest {
        document_id: id,
        token: args.token.clone(),
    };
    let response = match args.action {
        EndpointAction::Fork => endpoints.create_fork(&request),
        EndpointAction::Merge => endpoints.merge_fork(&request),
    }
    .map_err(|err| endpoint_failure(output, &err))?;

    render(output, &response, |resp, w| {
        if let Some(message) = &resp.message {
            writeln!(w, "✓ {message}")?;
        }
        if let Some(url) = &resp.redirect_url {
            writeln!(w, "redirect: {url}")?;
        }
        Ok(())
    })
}
