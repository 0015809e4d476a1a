use crate::iam::{create_role, PolicyStatement, RoleHandle, RoleProps};
use crate::naming::{logical_id, physical_name};
use crate::sqs::{EventSourceHandle, SqsEventSource};
use crate::template::{seconds, Asset, CfnResource, Handle, Template};
use eyre::{OptionExt, WrapErr};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Network attachment of a function
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct VpcConfig {
    pub subnet_ids: Vec<String>,
    pub security_group_ids: Vec<String>,
}

/// A function running on the standard (Node.js) runtime
#[derive(Clone, Debug, Default)]
pub struct FunctionProps {
    pub name: String,

    /// Directory with the function code
    pub code: PathBuf,
    pub handler: String,
    pub role: RoleProps,
    pub environment: BTreeMap<String, String>,
    pub timeout: Option<Duration>,

    /// Layer version ARNs
    pub layers: Vec<String>,
    pub vpc: Option<VpcConfig>,
}

#[derive(Clone, Debug, Default)]
pub struct PythonFunctionProps {
    pub name: String,
    pub code: PathBuf,
    pub handler: String,
    pub role: RoleProps,
    pub environment: BTreeMap<String, String>,
    pub timeout: Option<Duration>,
    pub layers: Vec<String>,
}

/// A function packaged as a container image
#[derive(Clone, Debug, Default)]
pub struct DockerFunctionProps {
    pub name: String,

    /// Build context, i.e. the directory with a Dockerfile
    pub code: PathBuf,

    /// Command the image is started with
    pub handler: String,
    pub role: RoleProps,
    pub environment: BTreeMap<String, String>,
    pub timeout: Duration,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionHandle {
    logical_id: String,
    physical_name: String,
    role: RoleHandle,
}

impl Handle for FunctionHandle {
    fn logical_id(&self) -> &str {
        &self.logical_id
    }
}

impl FunctionHandle {
    pub fn physical_name(&self) -> &str {
        &self.physical_name
    }

    /// Execution role of the function
    pub fn role(&self) -> &RoleHandle {
        &self.role
    }

    /// Set an environment variable, overwriting the previous value
    pub fn add_environment(
        &self,
        template: &mut Template,
        key: &str,
        value: &str,
    ) -> eyre::Result<()> {
        template
            .properties_mut(&self.logical_id)?
            .entry("Environment")
            .or_insert_with(|| json!({"Variables": {}}))
            .get_mut("Variables")
            .and_then(Value::as_object_mut)
            .ok_or_eyre("Malformed environment of the function")?
            .insert(key.into(), Value::String(value.into()));

        Ok(())
    }

    /// Trigger the function with the messages from a queue
    pub fn add_event_source(
        &self,
        template: &mut Template,
        source: &SqsEventSource,
    ) -> eyre::Result<EventSourceHandle> {
        source.bind(template, self)
    }
}

/// "Properties" of AWS::Lambda::Function
#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct FunctionProperties {
    function_name: String,
    role: Value,
    code: Value,
    memory_size: u32,

    #[serde(skip_serializing_if = "Option::is_none")]
    runtime: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    handler: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    package_type: Option<&'static str>,

    #[serde(skip_serializing_if = "Option::is_none")]
    image_config: Option<Value>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    architectures: Vec<String>,

    /// Seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    timeout: Option<u64>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    layers: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    vpc_config: Option<VpcConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    environment: Option<Value>,
}

impl FunctionProperties {
    fn new(name: &str, role: &RoleHandle, code: Value, memory_size: u32) -> Self {
        FunctionProperties {
            function_name: name.to_string(),
            role: role.arn(),
            code,
            memory_size,
            runtime: None,
            handler: None,
            package_type: None,
            image_config: None,
            architectures: vec![],
            timeout: None,
            layers: vec![],
            vpc_config: None,
            environment: None,
        }
    }

    fn environment(mut self, variables: &BTreeMap<String, String>) -> Self {
        if !variables.is_empty() {
            self.environment = Some(json!({"Variables": variables}));
        }

        self
    }
}

/// Add the function to the template
fn declare(
    template: &mut Template,
    name: String,
    role: RoleHandle,
    properties: FunctionProperties,
) -> eyre::Result<FunctionHandle> {
    let properties =
        serde_json::to_value(properties).wrap_err("Failed to serialize function properties")?;

    let function = FunctionHandle {
        logical_id: logical_id("Function", &name),
        physical_name: name,
        role,
    };

    template
        .add_resource(CfnResource {
            name: function.logical_id.clone(),
            resource: json!({
                "Type": "AWS::Lambda::Function",
                "Properties": properties,
            }),
        })
        .wrap_err_with(|| format!("Failed to declare function {}", function.physical_name))?;

    Ok(function)
}

/// Declare a function on the standard runtime together with its role
///
/// A function attached to a VPC is additionally allowed to manage network interfaces.
pub fn create_function(
    template: &mut Template,
    props: &FunctionProps,
    stage: &str,
) -> eyre::Result<FunctionHandle> {
    let role = create_role(template, &props.role, stage)?;

    if props.vpc.is_some() {
        let actions = template.defaults().network_interface_actions.clone();
        role.add_to_policy(template, PolicyStatement::allow(&actions, vec![json!("*")]))?;
    }

    let name = physical_name(&props.name, stage);
    let defaults = template.defaults();
    let bucket = defaults.asset_bucket.clone();
    let memory_size = defaults.standard_memory_size;
    let runtime = defaults.standard_runtime.clone();
    let code = template.add_asset(Asset::file(&props.code, &bucket)?);

    let properties = FunctionProperties {
        runtime: Some(runtime),
        handler: Some(props.handler.clone()),
        timeout: props.timeout.map(seconds),
        layers: props.layers.clone(),
        vpc_config: props.vpc.clone(),
        ..FunctionProperties::new(&name, &role, code, memory_size)
    }
    .environment(&props.environment);

    declare(template, name, role, properties)
}

/// Declare a function running a container image built from `code`
pub fn create_docker_function(
    template: &mut Template,
    props: &DockerFunctionProps,
    stage: &str,
) -> eyre::Result<FunctionHandle> {
    let role = create_role(template, &props.role, stage)?;
    let name = physical_name(&props.name, stage);
    let defaults = template.defaults();
    let repository = defaults.image_repository.clone();
    let memory_size = defaults.docker_memory_size;
    let architecture = defaults.docker_architecture.clone();
    let code = template.add_asset(Asset::image(&props.code, &repository)?);

    let properties = FunctionProperties {
        package_type: Some("Image"),
        image_config: Some(json!({"Command": [props.handler]})),
        architectures: vec![architecture],
        timeout: Some(seconds(props.timeout)),
        ..FunctionProperties::new(&name, &role, code, memory_size)
    }
    .environment(&props.environment);

    declare(template, name, role, properties)
}

pub fn create_python_function(
    template: &mut Template,
    props: &PythonFunctionProps,
    stage: &str,
) -> eyre::Result<FunctionHandle> {
    let role = create_role(template, &props.role, stage)?;
    let name = physical_name(&props.name, stage);
    let defaults = template.defaults();
    let bucket = defaults.asset_bucket.clone();
    let memory_size = defaults.python_memory_size;
    let runtime = defaults.python_runtime.clone();
    let code = template.add_asset(Asset::file(&props.code, &bucket)?);

    let properties = FunctionProperties {
        runtime: Some(runtime),
        handler: Some(props.handler.clone()),
        timeout: props.timeout.map(seconds),
        layers: props.layers.clone(),
        ..FunctionProperties::new(&name, &role, code, memory_size)
    }
    .environment(&props.environment);

    declare(template, name, role, properties)
}
