use crate::error::Error;
use crate::runner::{Runnable, Runner};
use crate::writer::Writer;
use serde_json::json;
use stagekit_constructs::naming::role_arn;

#[derive(clap::Args, Clone)]
pub(crate) struct RoleArnCommand {
    /// AWS account the stack is deployed to
    #[arg(short, long)]
    pub(crate) account_id: String,

    /// Name of the function, without the stage suffix
    #[arg(short, long)]
    pub(crate) lambda: String,

    #[arg(short, long)]
    pub(crate) stage: String,
}

impl Runnable for RoleArnCommand {
    fn runner<'a>(&self, writer: &'a Writer) -> impl Runner + 'a {
        RoleArnRunner {
            command: self.clone(),
            writer,
        }
    }
}

struct RoleArnRunner<'a> {
    command: RoleArnCommand,
    writer: &'a Writer,
}

impl Runner for RoleArnRunner<'_> {
    fn run(&mut self) -> Result<(), Error> {
        let arn = role_arn(
            &self.command.account_id,
            &self.command.lambda,
            &self.command.stage,
        );

        self.writer.text(&format!("{arn}\n"))?;
        self.writer.json(json!({ "arn": arn }))
    }
}
