pub(crate) mod list;
pub(crate) mod role_arn;
pub(crate) mod synth;
use crate::manifest::MANIFEST_FILENAME;
use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Synthesize the CloudFormation template and the assets manifest
    Synth(synth::SynthCommand),

    /// List the resources declared by the stack manifest
    List(list::ListCommand),

    /// Print the ARN of the role assumed by a function
    RoleArn(role_arn::RoleArnCommand),
}

/// Arguments shared by the commands reading a stack manifest
#[derive(clap::Args, Clone, Debug)]
pub(crate) struct ManifestArgs {
    /// Path to the stack manifest, or to a directory containing it
    #[arg(short, long, default_value = MANIFEST_FILENAME)]
    pub(crate) manifest: PathBuf,

    /// Override the stage defined in the manifest
    #[arg(short, long)]
    pub(crate) stage: Option<String>,
}
