use crate::cmd::project::{Project, parse_id};
use crate::output::{OutputMode, render};
use clap::Args;
use redraft_core::api::EndpointAction;
use redraft_core::model::DocumentId;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

#[derive(Args, Debug)]
pub struct TokenArgs {
    /// Endpoint the token is for: `fork` or `merge`.
    pub action: EndpointAction,

    /// Document ID the token is bound to.
    pub id: String,
}

#[derive(Debug, Serialize)]
struct TokenOutput {
    action: EndpointAction,
    id: DocumentId,
    token: String,
}

/// Execute `rd token`: issue a request token for one endpoint call.
///
/// The first call in a project without `api.token_secret` creates
/// `.redraft/api.key`, so it runs under the write lock.
pub fn run_token(args: &TokenArgs, output: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    let id = parse_id(&args.id, output)?;
    let project = Project::open(project_root, output)?;
    let tokens = {
        let _lock = project.write_lock(output)?;
        project.config.token_verifier(&project.paths)?
    };

    let result = TokenOutput {
        action: args.action,
        id,
        token: tokens.issue(args.action, id),
    };
    render(output, &result, |out, w| writeln!(w, "{}", out.token))
}
