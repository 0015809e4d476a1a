use crate::commands::synth::SynthCommand;
use crate::error::Error;
use crate::runner::Runner;
use crate::writer::Writer;
use eyre::WrapErr;
use serde_json::{json, Value};
use stagekit_constructs::Template;
use std::fs;
use std::path::Path;

pub(crate) const TEMPLATE_FILENAME: &str = "template.json";
pub(crate) const ASSETS_FILENAME: &str = "assets.json";

pub(crate) struct SynthRunner<'a> {
    pub(crate) command: SynthCommand,
    pub(crate) writer: &'a Writer,
}

impl Runner for SynthRunner<'_> {
    /// Declare all the manifest resources and output the template
    fn run(&mut self) -> Result<(), Error> {
        let args = &self.command.manifest;
        let manifest = self.manifest(&args.manifest, args.stage.as_deref())?;

        let template = manifest.template().map_err(|e| {
            self.error(
                Some("Failed to synthesize the template"),
                Some(&Error::from(e).to_string()),
                None,
            )
        })?;

        let Some(out) = &self.command.out else {
            self.writer.text(&format!("{template}\n"))?;

            return self.writer.json(json!({
                "template": template.to_value(),
                "assets": template.assets(),
            }));
        };

        write(out, &template).map_err(|e| {
            self.error(
                Some("Failed to write the template"),
                Some(&format!("Check that {out:?} is writable")),
                Some(e.into()),
            )
        })?;

        self.writer.text(&format!(
            "{} {} {}\n",
            console::style("Synthesized").green().bold(),
            console::style(manifest.stage()).bold(),
            console::style(format!("to {}", out.display())).dim(),
        ))?;

        self.writer.json(json!({
            "stage": manifest.stage(),
            "template": out.join(TEMPLATE_FILENAME),
            "assets": out.join(ASSETS_FILENAME),
        }))
    }
}

/// Write both the template and the assets manifest into the directory
fn write(out: &Path, template: &Template) -> eyre::Result<()> {
    fs::create_dir_all(out).wrap_err(format!("Failed to create {out:?}"))?;
    write_json(&out.join(TEMPLATE_FILENAME), &template.to_value())?;
    write_json(&out.join(ASSETS_FILENAME), &template.assets_manifest())
}

fn write_json(path: &Path, value: &Value) -> eyre::Result<()> {
    let content = serde_json::to_string_pretty(value).wrap_err("Failed to serialize")?;
    log::debug!("Writing {path:?}");
    fs::write(path, content).wrap_err(format!("Failed to write {path:?}"))
}
