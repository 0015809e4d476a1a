mod runner;
use crate::commands::ManifestArgs;
use crate::runner::{Runnable, Runner};
use crate::writer::Writer;
use runner::ListRunner;

#[derive(clap::Args, Clone)]
pub(crate) struct ListCommand {
    #[command(flatten)]
    pub(crate) manifest: ManifestArgs,
}

impl Runnable for ListCommand {
    fn runner<'a>(&self, writer: &'a Writer) -> impl Runner + 'a {
        ListRunner {
            command: self.clone(),
            writer,
        }
    }
}
