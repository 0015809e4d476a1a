//! Declare Lambda functions, their IAM roles and SQS queues in a CloudFormation
//! template, with stage-suffixed names and uniform permissions.
pub mod config;
pub mod iam;
pub mod lambda;
pub mod naming;
pub mod sqs;
pub mod template;

pub use config::{CommonProps, Defaults, InsightsPolicy};
pub use template::{Asset, CfnResource, Handle, Template};
