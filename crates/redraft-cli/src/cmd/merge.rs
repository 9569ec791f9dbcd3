use crate::cmd::fork::{RedirectOutput, write_redirect_pretty, write_redirect_text};
use crate::cmd::project::{Project, engine_failure, parse_id};
use crate::output::{OutputMode, render_mode};
use clap::Args;
use redraft_core::events::TracingObserver;
use std::path::Path;

#[derive(Args, Debug)]
pub struct MergeArgs {
    /// ID of the open fork to merge back into its original.
    pub id: String,
}

/// Execute `rd merge`: merge an open fork regardless of review state.
pub fn run_merge(args: &MergeArgs, output: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    let id = parse_id(&args.id, output)?;
    let project = Project::open(project_root, output)?;
    let _lock = project.write_lock(output)?;

    let trigger = project.trigger(&TracingObserver);
    let redirect = trigger
        .request_merge(id)
        .map_err(|err| engine_failure(output, &err))?;

    let result = RedirectOutput::new("merge", redirect.document, redirect);
    render_mode(output, &result, write_redirect_text, write_redirect_pretty)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_args_parse() {
        use clap::Parser;

        #[derive(Parser)]
        struct Wrapper {
            #[command(flatten)]
            args: MergeArgs,
        }

        let w = Wrapper::parse_from(["test", "43"]);
        assert_eq!(w.args.id, "43");
    }
}
