use crate::cmd::fork::{RedirectOutput, write_redirect_pretty, write_redirect_text};
use crate::cmd::project::{Project, engine_failure, parse_id};
use crate::cmd::submit::{StatusOutput, render_status};
use crate::output::{OutputMode, render_mode};
use clap::Args;
use redraft_core::events::TracingObserver;
use redraft_core::workflow::PublishOutcome;
use std::path::Path;

#[derive(Args, Debug)]
pub struct PublishArgs {
    /// Document ID. Publishing an open fork merges it into its original.
    pub id: String,
}

pub fn run_publish(args: &PublishArgs, output: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    let id = parse_id(&args.id, output)?;
    let project = Project::open(project_root, output)?;
    let _lock = project.write_lock(output)?;

    let trigger = project.trigger(&TracingObserver);
    let outcome = trigger.publish(id).map_err(|err| engine_failure(output, &err))?;

    match outcome {
        PublishOutcome::Merged {
            original, redirect, ..
        } => {
            let result = RedirectOutput::new("merge", original, redirect);
            render_mode(output, &result, write_redirect_text, write_redirect_pretty)
        }
        PublishOutcome::Published { id } => {
            let doc = project.require_document(id, output)?;
            render_status(
                output,
                &StatusOutput {
                    action: "publish",
                    id,
                    status: doc.status,
                },
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_args_parse() {
        use clap::Parser;

        #[derive(Parser)]
        struct Wrapper {
            #[command(flatten)]
            args: PublishArgs,
        }

        let w = Wrapper::parse_from(["test", "43"]);
        assert_eq!(w.args.id, "43");
    }
}
