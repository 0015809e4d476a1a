use crate::error::Error;
use eyre::WrapErr;
use serde::{Deserialize, Deserializer};
use stagekit_constructs::iam::{ManagedPolicy, RoleProps};
use stagekit_constructs::lambda::{
    create_docker_function, create_function, create_python_function, DockerFunctionProps,
    FunctionHandle, FunctionProps, PythonFunctionProps, VpcConfig,
};
use stagekit_constructs::sqs::{
    create_queue_with_dlq, create_sqs_event_source, QueueProps, SqsEventSourceProps,
};
use stagekit_constructs::{CommonProps, Defaults, Template};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub(crate) const MANIFEST_FILENAME: &str = "stagekit.toml";

/// Durations are written in a human readable form, e.g. "30s" or "5m"
fn duration<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    let value = String::deserialize(deserializer)?;
    humantime::parse_duration(&value).map_err(serde::de::Error::custom)
}

fn optional_duration<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Duration>, D::Error> {
    Option::<String>::deserialize(deserializer)?
        .map(|value| humantime::parse_duration(&value).map_err(serde::de::Error::custom))
        .transpose()
}

/// Manifest is the structure of stagekit.toml
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct Manifest {
    /// [stack]
    /// stage = "dev"
    stack: StackSection,

    /// [defaults]
    /// insights_policy = "always"
    #[serde(default)]
    defaults: Defaults,

    /// [[function]]
    /// name = "Orders"
    #[serde(default, rename = "function")]
    functions: Vec<FunctionSection>,

    /// [[queue]]
    /// name = "Orders"
    #[serde(default, rename = "queue")]
    queues: Vec<QueueSection>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct StackSection {
    stage: String,

    #[serde(default)]
    region: String,

    #[serde(default)]
    account_id: String,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum Runtime {
    #[default]
    Standard,
    Python,
    Docker,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct FunctionSection {
    name: String,

    #[serde(default)]
    runtime: Runtime,

    /// Code directory, or build context for docker functions
    code: PathBuf,
    handler: String,

    #[serde(default, deserialize_with = "optional_duration")]
    timeout: Option<Duration>,

    #[serde(default)]
    layers: Vec<String>,

    #[serde(default)]
    environment: BTreeMap<String, String>,

    /// Defaults to a "{name}-Role" role without custom permissions
    role: Option<RoleSection>,

    vpc: Option<VpcSection>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct RoleSection {
    name: Option<String>,

    #[serde(default)]
    managed_policies: Vec<String>,

    #[serde(default)]
    actions: Vec<String>,

    #[serde(default)]
    resources: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct VpcSection {
    subnet_ids: Vec<String>,

    #[serde(default)]
    security_group_ids: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct QueueSection {
    name: String,

    #[serde(deserialize_with = "duration")]
    visibility_timeout: Duration,
    max_receive_count: u32,

    /// [[queue.consumer]]
    /// function = "Orders"
    #[serde(default, rename = "consumer")]
    consumers: Vec<ConsumerSection>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConsumerSection {
    /// Name of a function declared in the same manifest
    function: String,
    batch_size: u32,

    #[serde(default, deserialize_with = "optional_duration")]
    max_batching_window: Option<Duration>,

    #[serde(default)]
    report_batch_item_failures: bool,
}

impl FunctionSection {
    fn role(&self) -> RoleProps {
        let section = self.role.clone().unwrap_or(RoleSection {
            name: None,
            managed_policies: vec![],
            actions: vec![],
            resources: vec![],
        });

        RoleProps {
            role_name: section
                .name
                .unwrap_or_else(|| format!("{}-Role", self.name)),

            managed_policies: section
                .managed_policies
                .iter()
                .map(|policy| ManagedPolicy::from(policy.as_str()))
                .collect(),

            actions: section.actions,
            resources: section.resources,
        }
    }

    fn vpc(&self) -> Option<VpcConfig> {
        self.vpc.as_ref().map(|vpc| VpcConfig {
            subnet_ids: vpc.subnet_ids.clone(),
            security_group_ids: vpc.security_group_ids.clone(),
        })
    }

    /// Declare the function with the helper matching its runtime
    fn declare(&self, template: &mut Template, stage: &str) -> eyre::Result<FunctionHandle> {
        if self.vpc.is_some() && self.runtime != Runtime::Standard {
            return Err(eyre::eyre!(
                "Function {} can't be attached to a VPC, only standard runtime supports it",
                self.name
            ));
        }

        match self.runtime {
            Runtime::Standard => create_function(
                template,
                &FunctionProps {
                    name: self.name.clone(),
                    code: self.code.clone(),
                    handler: self.handler.clone(),
                    role: self.role(),
                    environment: self.environment.clone(),
                    timeout: self.timeout,
                    layers: self.layers.clone(),
                    vpc: self.vpc(),
                },
                stage,
            ),

            Runtime::Python => create_python_function(
                template,
                &PythonFunctionProps {
                    name: self.name.clone(),
                    code: self.code.clone(),
                    handler: self.handler.clone(),
                    role: self.role(),
                    environment: self.environment.clone(),
                    timeout: self.timeout,
                    layers: self.layers.clone(),
                },
                stage,
            ),

            Runtime::Docker => {
                if !self.layers.is_empty() {
                    return Err(eyre::eyre!(
                        "Function {} is a container image and can't use layers",
                        self.name
                    ));
                }

                create_docker_function(
                    template,
                    &DockerFunctionProps {
                        name: self.name.clone(),
                        code: self.code.clone(),
                        handler: self.handler.clone(),
                        role: self.role(),
                        environment: self.environment.clone(),
                        timeout: self.timeout.ok_or_else(|| {
                            eyre::eyre!("Docker function {} requires a timeout", self.name)
                        })?,
                    },
                    stage,
                )
            }
        }
    }
}

impl ConsumerSection {
    fn props(&self) -> SqsEventSourceProps {
        SqsEventSourceProps {
            batch_size: self.batch_size,
            max_batching_window: self.max_batching_window.unwrap_or_default(),
            report_batch_item_failures: self.report_batch_item_failures,
        }
    }
}

impl Manifest {
    /// Reads a manifest from a file, or from stagekit.toml if the path is a directory
    pub(crate) fn from_path(path: &Path) -> eyre::Result<Self> {
        let path = if path.is_dir() {
            path.join(MANIFEST_FILENAME)
        } else {
            path.to_path_buf()
        };

        let toml_string = fs::read_to_string(&path).map_err(|e| {
            Error::new(
                "Manifest not found",
                Some(&format!("Could not read a stack manifest at {path:?}: {e}")),
            )
        })?;

        toml::from_str(&toml_string).map_err(|e| {
            Error::new(&format!("Failed to parse {path:?}"), Some(&e.to_string())).into()
        })
    }

    pub(crate) fn stage(&self) -> &str {
        &self.stack.stage
    }

    /// Use another stage than the one defined in the manifest
    pub(crate) fn set_stage(&mut self, stage: &str) {
        self.stack.stage = stage.to_string();
    }

    /// Declare all the manifest resources in a new template
    ///
    /// Functions come first, so that queues can be bound to them.
    pub(crate) fn template(&self) -> eyre::Result<Template> {
        let mut template = Template::with_defaults(
            CommonProps {
                stage: self.stack.stage.clone(),
                region: self.stack.region.clone(),
                account_id: self.stack.account_id.clone(),
            },
            self.defaults.clone(),
        );

        let stage = self.stage();
        let mut functions: HashMap<&str, FunctionHandle> = HashMap::new();

        for function in &self.functions {
            let handle = function
                .declare(&mut template, stage)
                .wrap_err_with(|| format!("Failed to declare function {}", function.name))?;

            functions.insert(&function.name, handle);
        }

        for queue in &self.queues {
            let pair = create_queue_with_dlq(
                &mut template,
                &queue.name,
                stage,
                &QueueProps {
                    visibility_timeout: queue.visibility_timeout,
                    max_receive_count: queue.max_receive_count,
                },
            )?;

            for consumer in &queue.consumers {
                let function = functions.get(consumer.function.as_str()).ok_or_else(|| {
                    eyre::eyre!(
                        "Queue {} is consumed by unknown function {}",
                        queue.name,
                        consumer.function
                    )
                })?;

                function.add_event_source(
                    &mut template,
                    &create_sqs_event_source(&pair.queue, &consumer.props()),
                )?;
            }
        }

        log::info!(
            "Declared {} resources for stage {stage}",
            template.resources().count()
        );

        Ok(template)
    }
}
