use crate::config::{self, CommonProps, Defaults};
use crate::template::Asset;
use eyre::ContextCompat;
use serde_json::{json, Map, Value};
use std::time::Duration;

/// A CloudFormation template being assembled by the helpers
#[derive(Clone, Debug)]
pub struct Template {
    props: CommonProps,
    defaults: Defaults,

    /// Resources in the order they were declared
    resources: Map<String, Value>,

    assets: Vec<Asset>,
}

/// A single entry of the "Resources" section
#[derive(Clone, Debug)]
pub struct CfnResource {
    pub name: String,
    pub resource: Value,
}

/// A declared resource which other resources can point to
pub trait Handle {
    /// Key of the resource in the template
    fn logical_id(&self) -> &str;

    fn reference(&self) -> Value {
        json!({"Ref": self.logical_id()})
    }

    fn get_att(&self, attribute: &str) -> Value {
        json!({"Fn::GetAtt": [self.logical_id(), attribute]})
    }

    fn arn(&self) -> Value {
        self.get_att("Arn")
    }
}

/// Whole seconds of a duration, rounded up
///
/// CloudFormation only takes seconds, so "500ms" becomes 1 rather than 0.
pub(crate) fn seconds(duration: Duration) -> u64 {
    duration.as_secs() + u64::from(duration.subsec_nanos() > 0)
}

impl Template {
    pub fn new(props: CommonProps) -> Self {
        Self::with_defaults(props, config::defaults().clone())
    }

    pub fn with_defaults(props: CommonProps, defaults: Defaults) -> Self {
        Template {
            props,
            defaults,
            resources: Map::new(),
            assets: vec![],
        }
    }

    pub fn props(&self) -> &CommonProps {
        &self.props
    }

    pub fn stage(&self) -> &str {
        &self.props.stage
    }

    pub fn defaults(&self) -> &Defaults {
        &self.defaults
    }

    /// Add a resource to the CFN template
    ///
    /// Fails if the logical id is already taken.
    pub fn add_resource(
        &mut self,
        CfnResource { name, resource }: CfnResource,
    ) -> eyre::Result<()> {
        if self.resources.contains_key(&name) {
            return Err(eyre::eyre!("Resource {name} is already defined in the template"));
        }

        log::debug!("Declaring {name}");
        self.resources.insert(name, resource);
        Ok(())
    }

    pub fn resource(&self, name: &str) -> Option<&Value> {
        self.resources.get(name)
    }

    /// All the resources, in the declaration order
    pub fn resources(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.resources.iter()
    }

    /// Mutable "Properties" of a declared resource
    pub(crate) fn properties_mut(
        &mut self,
        name: &str,
    ) -> eyre::Result<&mut Map<String, Value>> {
        self.resources
            .get_mut(name)
            .wrap_err_with(|| format!("No resource {name} in the template"))?
            .get_mut("Properties")
            .and_then(Value::as_object_mut)
            .wrap_err_with(|| format!("Resource {name} has no properties"))
    }

    /// Register local code and return its "Code" property
    ///
    /// The same asset referenced by several functions is listed once.
    pub(crate) fn add_asset(&mut self, asset: Asset) -> Value {
        let code = asset.code(&self.props);

        if !self.assets.contains(&asset) {
            self.assets.push(asset);
        }

        code
    }

    pub fn assets(&self) -> &[Asset] {
        &self.assets
    }

    /// The full template document
    pub fn to_value(&self) -> Value {
        json!({
            "AWSTemplateFormatVersion": "2010-09-09",
            "Resources": self.resources,
        })
    }

    /// The manifest listing the assets to publish before deployment
    pub fn assets_manifest(&self) -> Value {
        json!({"assets": self.assets})
    }
}

impl std::fmt::Display for Template {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let template =
            serde_json::to_string_pretty(&self.to_value()).map_err(|_| std::fmt::Error)?;

        write!(f, "{template}")
    }
}
