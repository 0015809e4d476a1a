mod runner;
use crate::commands::ManifestArgs;
use crate::runner::{Runnable, Runner};
use crate::writer::Writer;
use runner::SynthRunner;
use std::path::PathBuf;

#[derive(clap::Args, Clone)]
pub(crate) struct SynthCommand {
    #[command(flatten)]
    pub(crate) manifest: ManifestArgs,

    /// Directory to write template.json and assets.json to (printed to stdout if not set)
    #[arg(short, long)]
    pub(crate) out: Option<PathBuf>,
}

impl Runnable for SynthCommand {
    fn runner<'a>(&self, writer: &'a Writer) -> impl Runner + 'a {
        SynthRunner {
            command: self.clone(),
            writer,
        }
    }
}
