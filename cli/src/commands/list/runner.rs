use crate::commands::list::ListCommand;
use crate::error::Error;
use crate::runner::Runner;
use crate::writer::Writer;
use serde::Serialize;
use serde_json::Value;
use stagekit_constructs::Template;
use tabled::settings::{peaker::Priority, style::Style, Settings, Width};
use tabled::{Table, Tabled};
use terminal_size::{terminal_size, Width as TerminalWidth};

/// Used when the output is not a terminal
const DEFAULT_WIDTH: usize = 120;

/// Properties holding the physical name, per resource type
const NAME_PROPERTIES: [&str; 3] = ["RoleName", "FunctionName", "QueueName"];

#[derive(Tabled, Serialize, Clone, Debug, PartialEq, Eq)]
struct ResourceRow {
    #[tabled(rename = "Logical ID")]
    logical_id: String,

    #[tabled(rename = "Type")]
    #[serde(rename = "type")]
    resource_type: String,

    #[tabled(rename = "Name")]
    name: String,
}

impl ResourceRow {
    fn new(logical_id: &str, resource: &Value) -> Self {
        let properties = &resource["Properties"];

        // Event source mappings refer to the function instead of naming themselves
        let name = match resource["Type"].as_str() {
            Some("AWS::Lambda::EventSourceMapping") => None,
            _ => NAME_PROPERTIES
                .iter()
                .find_map(|property| properties[*property].as_str()),
        };

        ResourceRow {
            logical_id: logical_id.to_string(),
            resource_type: resource["Type"].as_str().unwrap_or("-").to_string(),
            name: name.unwrap_or("-").to_string(),
        }
    }
}

fn rows(template: &Template) -> Vec<ResourceRow> {
    template
        .resources()
        .map(|(logical_id, resource)| ResourceRow::new(logical_id, resource))
        .collect()
}

fn terminal_width() -> usize {
    terminal_size()
        .map(|(TerminalWidth(width), _)| width as usize)
        .unwrap_or(DEFAULT_WIDTH)
}

pub(crate) struct ListRunner<'a> {
    pub(crate) command: ListCommand,
    pub(crate) writer: &'a Writer,
}

impl Runner for ListRunner<'_> {
    /// Prints out the resources in the order they are declared
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

        let rows = rows(&template);

        if self.writer.is_structured() {
            return self.writer.json(serde_json::to_value(&rows).map_err(|e| {
                self.error(None, None, Some(e.into()))
            })?);
        }

        if rows.is_empty() {
            return self
                .writer
                .text(&format!("{}\n", console::style("No resources found").yellow()));
        }

        let width = terminal_width();

        let settings = Settings::default()
            .with(Width::wrap(width).priority(Priority::max(true)))
            .with(Width::increase(width));

        let mut table = Table::new(rows);
        table.with(Style::modern()).with(settings);

        self.writer.text(&format!(
            "{} {}\n{table}\n",
            console::style("Stage").dim(),
            console::style(manifest.stage()).bold(),
        ))
    }
}
