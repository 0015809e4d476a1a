use serde::Deserialize;
use std::sync::OnceLock;

/// Whether a role gets the Lambda Insights managed policy
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InsightsPolicy {
    /// Attach only to roles that received a custom statement
    #[default]
    WithCustomStatement,
    Always,
    Never,
}

impl InsightsPolicy {
    pub fn applies(&self, has_custom_statement: bool) -> bool {
        match self {
            InsightsPolicy::WithCustomStatement => has_custom_statement,
            InsightsPolicy::Always => true,
            InsightsPolicy::Never => false,
        }
    }
}

/// Fixed values baked into every declared resource
///
/// Can be partially overridden from the `[defaults]` table of a stack manifest,
/// missing keys fall back to the values below.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Defaults {
    /// The only principal allowed to assume function roles
    pub trust_principal: String,

    /// AWS managed policy granting Lambda Insights access
    pub insights_policy_name: String,
    pub insights_policy: InsightsPolicy,

    /// Allowed for functions attached to a VPC
    pub network_interface_actions: Vec<String>,

    /// Granted to a function consuming a queue
    pub queue_consume_actions: Vec<String>,

    pub standard_runtime: String,
    pub python_runtime: String,
    pub docker_architecture: String,

    pub standard_memory_size: u32,
    pub docker_memory_size: u32,
    pub python_memory_size: u32,

    /// S3 bucket the code assets are published to
    pub asset_bucket: String,

    /// ECR repository the container images are pushed to
    pub image_repository: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Defaults {
            trust_principal: "lambda.amazonaws.com".into(),
            insights_policy_name: "CloudWatchLambdaInsightsExecutionRolePolicy".into(),
            insights_policy: InsightsPolicy::default(),

            network_interface_actions: [
                "ec2:DescribeNetworkInterfaces",
                "ec2:CreateNetworkInterface",
                "ec2:DeleteNetworkInterface",
                "ec2:DescribeInstances",
                "ec2:AttachNetworkInterface",
                "cloudwatch:PutMetricData",
            ]
            .map(String::from)
            .to_vec(),

            queue_consume_actions: [
                "sqs:ChangeMessageVisibility",
                "sqs:DeleteMessage",
                "sqs:GetQueueAttributes",
                "sqs:GetQueueUrl",
                "sqs:ReceiveMessage",
            ]
            .map(String::from)
            .to_vec(),

            standard_runtime: "nodejs20.x".into(),
            python_runtime: "python3.11".into(),
            docker_architecture: "x86_64".into(),

            standard_memory_size: 1024,
            docker_memory_size: 2024,
            python_memory_size: 512,

            asset_bucket: option_env!("STAGEKIT_ASSET_BUCKET")
                .unwrap_or("stagekit-assets")
                .into(),

            image_repository: option_env!("STAGEKIT_IMAGE_REPOSITORY")
                .unwrap_or("stagekit-images")
                .into(),
        }
    }
}

static DEFAULTS: OnceLock<Defaults> = OnceLock::new();

pub fn defaults() -> &'static Defaults {
    DEFAULTS.get_or_init(Defaults::default)
}

/// Stack-wide properties shared by all the resources of a template
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommonProps {
    /// Deployment environment, e.g. "dev" or "prod"
    pub stage: String,
    pub region: String,
    pub account_id: String,
}
