use crate::naming::{logical_id, physical_name};
use crate::template::{CfnResource, Handle, Template};
use eyre::{OptionExt, WrapErr};
use serde::Serialize;
use serde_json::{json, Value};

/// Name of the inline policy collecting all the statements added to a role
const DEFAULT_POLICY_NAME: &str = "DefaultPolicy";

/// A managed policy attachable to a role
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ManagedPolicy {
    /// Maintained by AWS, e.g. "service-role/AWSLambdaBasicExecutionRole"
    AwsManaged(String),
    Arn(String),
}

impl ManagedPolicy {
    pub fn from_aws_managed_policy_name(name: &str) -> Self {
        ManagedPolicy::AwsManaged(name.to_string())
    }

    pub fn arn(&self) -> String {
        match self {
            ManagedPolicy::AwsManaged(name) => format!("arn:aws:iam::aws:policy/{name}"),
            ManagedPolicy::Arn(arn) => arn.clone(),
        }
    }
}

/// Full ARNs are taken as is, anything else is an AWS managed policy name
impl From<&str> for ManagedPolicy {
    fn from(value: &str) -> Self {
        if value.starts_with("arn:") {
            ManagedPolicy::Arn(value.to_string())
        } else {
            ManagedPolicy::from_aws_managed_policy_name(value)
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Effect {
    Allow,
    Deny,
}

/// A permission rule embedded into a role's inline policy
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PolicyStatement {
    #[serde(rename = "Effect")]
    pub effect: Effect,

    #[serde(rename = "Action")]
    pub actions: Vec<String>,

    /// Plain ARNs or intrinsic functions (e.g. "Fn::GetAtt")
    #[serde(rename = "Resource")]
    pub resources: Vec<Value>,
}

impl PolicyStatement {
    pub fn allow(actions: &[String], resources: Vec<Value>) -> Self {
        PolicyStatement {
            effect: Effect::Allow,
            actions: actions.to_vec(),
            resources,
        }
    }
}

/// Input for a role assumed by a function
#[derive(Clone, Debug, Default)]
pub struct RoleProps {
    /// Stage suffix is appended to the name
    pub role_name: String,
    pub managed_policies: Vec<ManagedPolicy>,
    pub actions: Vec<String>,
    pub resources: Vec<String>,
}

impl RoleProps {
    /// Whether the props describe a custom statement
    ///
    /// A statement requires both actions and resources.
    pub fn has_statement(&self) -> bool {
        !self.actions.is_empty() && !self.resources.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoleHandle {
    logical_id: String,
    physical_name: String,
}

impl Handle for RoleHandle {
    fn logical_id(&self) -> &str {
        &self.logical_id
    }
}

impl RoleHandle {
    pub fn physical_name(&self) -> &str {
        &self.physical_name
    }

    /// Append a statement to the role's inline policy
    ///
    /// All statements end up in a single policy document, which is created on first use.
    pub fn add_to_policy(
        &self,
        template: &mut Template,
        statement: PolicyStatement,
    ) -> eyre::Result<()> {
        let statement =
            serde_json::to_value(&statement).wrap_err("Failed to serialize policy statement")?;

        let policies = template
            .properties_mut(&self.logical_id)?
            .entry("Policies")
            .or_insert_with(|| json!([]))
            .as_array_mut()
            .ok_or_eyre("Policies property is not a list")?;

        let position = policies
            .iter()
            .position(|policy| policy["PolicyName"] == DEFAULT_POLICY_NAME);

        let policy = match position {
            Some(index) => &mut policies[index],

            None => {
                policies.push(json!({
                    "PolicyName": DEFAULT_POLICY_NAME,
                    "PolicyDocument": {
                        "Version": "2012-10-17",
                        "Statement": []
                    }
                }));

                policies.last_mut().ok_or_eyre("Failed to add default policy")?
            }
        };

        policy
            .pointer_mut("/PolicyDocument/Statement")
            .and_then(Value::as_array_mut)
            .ok_or_eyre("Default policy has no statements list")?
            .push(statement);

        Ok(())
    }

    /// Attach a managed policy, attaching the same policy twice has no effect
    pub fn add_managed_policy(
        &self,
        template: &mut Template,
        policy: &ManagedPolicy,
    ) -> eyre::Result<()> {
        let arns = template
            .properties_mut(&self.logical_id)?
            .entry("ManagedPolicyArns")
            .or_insert_with(|| json!([]))
            .as_array_mut()
            .ok_or_eyre("ManagedPolicyArns property is not a list")?;

        let arn = Value::String(policy.arn());

        if !arns.contains(&arn) {
            arns.push(arn);
        }

        Ok(())
    }
}

/// Declare a role which only the functions' service principal can assume
///
/// The role is named `{role_name}-{stage}`. If both actions and resources are set,
/// an allow statement covering them is added, and the Lambda Insights policy is
/// attached (see `InsightsPolicy` for other options).
pub fn create_role(
    template: &mut Template,
    props: &RoleProps,
    stage: &str,
) -> eyre::Result<RoleHandle> {
    let name = physical_name(&props.role_name, stage);

    let role = RoleHandle {
        logical_id: logical_id("Role", &name),
        physical_name: name,
    };

    let defaults = template.defaults();
    let principal = defaults.trust_principal.clone();
    let insights = defaults.insights_policy;
    let insights_policy =
        ManagedPolicy::from_aws_managed_policy_name(&defaults.insights_policy_name);

    template
        .add_resource(CfnResource {
            name: role.logical_id.clone(),
            resource: json!({
                "Type": "AWS::IAM::Role",
                "Properties": {
                    "RoleName": role.physical_name,
                    "AssumeRolePolicyDocument": {
                        "Version": "2012-10-17",
                        "Statement": [{
                            "Effect": "Allow",
                            "Principal": {
                                "Service": [principal]
                            },
                            "Action": ["sts:AssumeRole"]
                        }]
                    },
                    "ManagedPolicyArns": props
                        .managed_policies
                        .iter()
                        .map(ManagedPolicy::arn)
                        .collect::<Vec<String>>(),
                }
            }),
        })
        .wrap_err_with(|| format!("Failed to declare role {}", role.physical_name))?;

    if props.has_statement() {
        role.add_to_policy(
            template,
            PolicyStatement::allow(
                &props.actions,
                props.resources.iter().cloned().map(Value::String).collect(),
            ),
        )?;
    }

    if insights.applies(props.has_statement()) {
        role.add_managed_policy(template, &insights_policy)?;
    }

    Ok(role)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CommonProps, Defaults, InsightsPolicy};

    const INSIGHTS_ARN: &str = "arn:aws:iam::aws:policy/CloudWatchLambdaInsightsExecutionRolePolicy";

    fn template() -> Template {
        Template::new(CommonProps {
            stage: "dev".into(),
            region: "us-east-1".into(),
            account_id: "123456789012".into(),
        })
    }

    fn properties<'a>(template: &'a Template, role: &RoleHandle) -> &'a Value {
        &template.resource(role.logical_id()).unwrap()["Properties"]
    }

    #[test]
    fn role_without_statement() {
        let mut template = template();

        let props = RoleProps {
            role_name: "Foo".into(),
            ..Default::default()
        };

        let role = create_role(&mut template, &props, "dev").unwrap();
        let properties = properties(&template, &role);

        assert_eq!(role.physical_name(), "Foo-dev");
        assert_eq!(properties["RoleName"], "Foo-dev");
        assert!(properties.get("Policies").is_none());
        assert_eq!(properties["ManagedPolicyArns"], json!([]));
    }

    #[test]
    fn role_with_statement() {
        let mut template = template();

        let props = RoleProps {
            role_name: "Foo".into(),
            actions: vec!["s3:GetObject".into()],
            resources: vec!["arn:aws:s3:::bucket/*".into()],
            ..Default::default()
        };

        let role = create_role(&mut template, &props, "prod").unwrap();
        let properties = properties(&template, &role);

        assert_eq!(properties["RoleName"], "Foo-prod");
        assert_eq!(
            properties["Policies"],
            json!([{
                "PolicyName": "DefaultPolicy",
                "PolicyDocument": {
                    "Version": "2012-10-17",
                    "Statement": [{
                        "Effect": "Allow",
                        "Action": ["s3:GetObject"],
                        "Resource": ["arn:aws:s3:::bucket/*"]
                    }]
                }
            }])
        );

        assert_eq!(properties["ManagedPolicyArns"], json!([INSIGHTS_ARN]));
    }

    #[test]
    fn statement_requires_actions_and_resources() {
        for (actions, resources) in [
            (vec!["s3:GetObject".to_string()], vec![]),
            (vec![], vec!["*".to_string()]),
        ] {
            let mut template = template();

            let props = RoleProps {
                role_name: "Foo".into(),
                actions,
                resources,
                ..Default::default()
            };

            let role = create_role(&mut template, &props, "dev").unwrap();
            let properties = properties(&template, &role);

            assert!(properties.get("Policies").is_none());
            assert_eq!(properties["ManagedPolicyArns"], json!([]));
        }
    }

    #[test]
    fn trusted_by_lambda_only() {
        let mut template = template();
        let role = create_role(&mut template, &RoleProps::default(), "dev").unwrap();

        assert_eq!(
            properties(&template, &role)["AssumeRolePolicyDocument"]["Statement"],
            json!([{
                "Effect": "Allow",
                "Principal": {"Service": ["lambda.amazonaws.com"]},
                "Action": ["sts:AssumeRole"]
            }])
        );
    }

    #[test]
    fn managed_policies_are_attached() {
        let mut template = template();

        let props = RoleProps {
            role_name: "Foo".into(),
            managed_policies: vec![
                "service-role/AWSLambdaBasicExecutionRole".into(),
                "arn:aws:iam::123456789012:policy/Custom".into(),
            ],
            ..Default::default()
        };

        let role = create_role(&mut template, &props, "dev").unwrap();

        assert_eq!(
            properties(&template, &role)["ManagedPolicyArns"],
            json!([
                "arn:aws:iam::aws:policy/service-role/AWSLambdaBasicExecutionRole",
                "arn:aws:iam::123456789012:policy/Custom"
            ])
        );
    }

    #[test]
    fn statements_share_one_policy() {
        let mut template = template();

        let props = RoleProps {
            role_name: "Foo".into(),
            actions: vec!["s3:GetObject".into()],
            resources: vec!["*".into()],
            ..Default::default()
        };

        let role = create_role(&mut template, &props, "dev").unwrap();

        role.add_to_policy(
            &mut template,
            PolicyStatement::allow(&["sqs:SendMessage".to_string()], vec![json!("*")]),
        )
        .unwrap();

        // Insights policy is attached once even if requested again
        role.add_managed_policy(&mut template, &INSIGHTS_ARN.into()).unwrap();

        let properties = properties(&template, &role);
        let policies = properties["Policies"].as_array().unwrap();

        assert_eq!(policies.len(), 1);
        assert_eq!(
            policies[0]["PolicyDocument"]["Statement"]
                .as_array()
                .unwrap()
                .len(),
            2
        );
        assert_eq!(properties["ManagedPolicyArns"], json!([INSIGHTS_ARN]));
    }

    #[test]
    fn insights_policy_can_be_unconditional() {
        let defaults = Defaults {
            insights_policy: InsightsPolicy::Always,
            ..Default::default()
        };

        let mut template = Template::with_defaults(CommonProps::default(), defaults);
        let role = create_role(&mut template, &RoleProps::default(), "dev").unwrap();
        let properties = properties(&template, &role);

        assert!(properties.get("Policies").is_none());
        assert_eq!(properties["ManagedPolicyArns"], json!([INSIGHTS_ARN]));
    }

    #[test]
    fn duplicate_role_fails() {
        let mut template = template();
        let props = RoleProps {
            role_name: "Foo".into(),
            ..Default::default()
        };

        create_role(&mut template, &props, "dev").unwrap();
        assert!(create_role(&mut template, &props, "dev").is_err());
        assert!(create_role(&mut template, &props, "prod").is_ok());
    }
}
