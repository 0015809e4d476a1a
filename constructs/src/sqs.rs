use crate::iam::PolicyStatement;
use crate::lambda::FunctionHandle;
use crate::naming::{escape_resource_name, logical_id, physical_name};
use crate::template::{seconds, CfnResource, Handle, Template};
use eyre::WrapErr;
use serde_json::json;
use std::fmt;
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueueCategory {
    Sqs,
    Dlq,
}

impl fmt::Display for QueueCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueCategory::Sqs => write!(f, "SQS"),
            QueueCategory::Dlq => write!(f, "DLQ"),
        }
    }
}

/// Name of a queue, e.g. "Orders-DLQ-Queue-dev"
pub fn queue_name(base_name: &str, category: QueueCategory, stage: &str) -> String {
    physical_name(&format!("{base_name}-{category}-Queue"), stage)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueueProps {
    pub visibility_timeout: Duration,

    /// Receives after which a message goes to the dead-letter queue
    pub max_receive_count: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueueHandle {
    logical_id: String,
    physical_name: String,
}

impl Handle for QueueHandle {
    fn logical_id(&self) -> &str {
        &self.logical_id
    }
}

impl QueueHandle {
    fn new(physical_name: String) -> Self {
        QueueHandle {
            logical_id: logical_id("Queue", &physical_name),
            physical_name,
        }
    }

    pub fn physical_name(&self) -> &str {
        &self.physical_name
    }
}

/// A primary queue and the dead-letter queue it redrives to
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueuePair {
    pub queue: QueueHandle,
    pub dlq: QueueHandle,
}

fn create_dlq_queue(
    template: &mut Template,
    queue_name_base: &str,
    stage: &str,
) -> eyre::Result<QueueHandle> {
    let dlq = QueueHandle::new(queue_name(queue_name_base, QueueCategory::Dlq, stage));

    template
        .add_resource(CfnResource {
            name: dlq.logical_id.clone(),
            resource: json!({
                "Type": "AWS::SQS::Queue",
                "Properties": {
                    "QueueName": dlq.physical_name,
                }
            }),
        })
        .wrap_err_with(|| format!("Failed to declare queue {}", dlq.physical_name))?;

    Ok(dlq)
}

/// Declare a queue together with its dead-letter queue
///
/// The dead-letter queue is declared first. Messages received more than
/// `max_receive_count` times are moved to it.
pub fn create_queue_with_dlq(
    template: &mut Template,
    queue_name_base: &str,
    stage: &str,
    props: &QueueProps,
) -> eyre::Result<QueuePair> {
    let dlq = create_dlq_queue(template, queue_name_base, stage)?;
    let queue = QueueHandle::new(queue_name(queue_name_base, QueueCategory::Sqs, stage));

    template
        .add_resource(CfnResource {
            name: queue.logical_id.clone(),
            resource: json!({
                "Type": "AWS::SQS::Queue",
                "Properties": {
                    "QueueName": queue.physical_name,
                    "VisibilityTimeout": seconds(props.visibility_timeout),
                    "RedrivePolicy": {
                        "deadLetterTargetArn": dlq.arn(),
                        "maxReceiveCount": props.max_receive_count,
                    }
                }
            }),
        })
        .wrap_err_with(|| format!("Failed to declare queue {}", queue.physical_name))?;

    Ok(QueuePair { queue, dlq })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SqsEventSourceProps {
    pub batch_size: u32,
    pub max_batching_window: Duration,

    /// Let the function report failed messages instead of failing the whole batch
    pub report_batch_item_failures: bool,
}

/// A queue ready to be bound to a function
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SqsEventSource {
    pub queue: QueueHandle,
    pub props: SqsEventSourceProps,
}

pub fn create_sqs_event_source(
    queue: &QueueHandle,
    props: &SqsEventSourceProps,
) -> SqsEventSource {
    SqsEventSource {
        queue: queue.clone(),
        props: *props,
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventSourceHandle {
    logical_id: String,
}

impl Handle for EventSourceHandle {
    fn logical_id(&self) -> &str {
        &self.logical_id
    }
}

impl SqsEventSource {
    /// Declare the mapping which triggers the function with the queue messages
    ///
    /// The function's role is allowed to consume the queue.
    pub(crate) fn bind(
        &self,
        template: &mut Template,
        function: &FunctionHandle,
    ) -> eyre::Result<EventSourceHandle> {
        let handle = EventSourceHandle {
            logical_id: format!(
                "EventSourceMapping{}{}",
                escape_resource_name(function.physical_name()),
                escape_resource_name(self.queue.physical_name()),
            ),
        };

        let response_types = if self.props.report_batch_item_failures {
            vec!["ReportBatchItemFailures"]
        } else {
            vec![]
        };

        template
            .add_resource(CfnResource {
                name: handle.logical_id.clone(),
                resource: json!({
                    "Type": "AWS::Lambda::EventSourceMapping",
                    "Properties": {
                        "EventSourceArn": self.queue.arn(),
                        "FunctionName": function.reference(),
                        "BatchSize": self.props.batch_size,
                        "MaximumBatchingWindowInSeconds": seconds(self.props.max_batching_window),
                        "FunctionResponseTypes": response_types,
                    }
                }),
            })
            .wrap_err_with(|| {
                format!(
                    "Failed to bind {} to {}",
                    self.queue.physical_name(),
                    function.physical_name()
                )
            })?;

        let actions = template.defaults().queue_consume_actions.clone();

        function
            .role()
            .add_to_policy(template, PolicyStatement::allow(&actions, vec![self.queue.arn()]))?;

        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CommonProps;
    use crate::iam::RoleProps;
    use crate::lambda::{create_function, FunctionProps};
    use serde_json::{json, Value};

    fn template() -> Template {
        Template::new(CommonProps {
            stage: "dev".into(),
            region: "us-east-1".into(),
            account_id: "123456789012".into(),
        })
    }

    fn orders(template: &mut Template) -> QueuePair {
        create_queue_with_dlq(
            template,
            "Orders",
            "dev",
            &QueueProps {
                visibility_timeout: Duration::from_secs(30),
                max_receive_count: 3,
            },
        )
        .unwrap()
    }

    #[test]
    fn queue_names() {
        assert_eq!(
            queue_name("Orders", QueueCategory::Sqs, "dev"),
            "Orders-SQS-Queue-dev"
        );

        assert_eq!(
            queue_name("Orders", QueueCategory::Dlq, "prod"),
            "Orders-DLQ-Queue-prod"
        );
    }

    #[test]
    fn queue_with_dlq() {
        let mut template = template();
        let QueuePair { queue, dlq } = orders(&mut template);

        assert_eq!(dlq.physical_name(), "Orders-DLQ-Queue-dev");
        assert_eq!(queue.physical_name(), "Orders-SQS-Queue-dev");

        let properties = &template.resource(queue.logical_id()).unwrap()["Properties"];
        assert_eq!(properties["QueueName"], "Orders-SQS-Queue-dev");
        assert_eq!(properties["VisibilityTimeout"], 30);
        assert_eq!(
            properties["RedrivePolicy"],
            json!({
                "deadLetterTargetArn": {"Fn::GetAtt": [dlq.logical_id(), "Arn"]},
                "maxReceiveCount": 3
            })
        );

        let dlq_properties = &template.resource(dlq.logical_id()).unwrap()["Properties"];
        assert_eq!(dlq_properties, &json!({"QueueName": "Orders-DLQ-Queue-dev"}));
    }

    #[test]
    fn dlq_is_declared_first() {
        let mut template = template();
        let QueuePair { queue, dlq } = orders(&mut template);

        let names: Vec<&str> = template
            .resources()
            .map(|(name, _)| name.as_str())
            .collect();

        assert_eq!(names, [dlq.logical_id(), queue.logical_id()]);
    }

    #[test]
    fn same_queue_twice_fails() {
        let mut template = template();
        orders(&mut template);

        let props = QueueProps {
            visibility_timeout: Duration::from_secs(10),
            max_receive_count: 1,
        };

        assert!(create_queue_with_dlq(&mut template, "Orders", "dev", &props).is_err());
    }

    #[test]
    fn event_source_is_pass_through() {
        let mut template = template();
        let pair = orders(&mut template);

        let props = SqsEventSourceProps {
            batch_size: 10,
            max_batching_window: Duration::from_secs(5),
            report_batch_item_failures: true,
        };

        let source = create_sqs_event_source(&pair.queue, &props);
        assert_eq!(source.queue, pair.queue);
        assert_eq!(source.props, props);
    }

    #[test]
    fn binding_grants_consume_permissions() {
        let mut template = template();
        let pair = orders(&mut template);

        let function = create_function(
            &mut template,
            &FunctionProps {
                name: "OrdersHandler".into(),
                code: "dist/orders".into(),
                handler: "index.handler".into(),
                role: RoleProps {
                    role_name: "OrdersHandler-Role".into(),
                    ..Default::default()
                },
                ..Default::default()
            },
            "dev",
        )
        .unwrap();

        let mapping = function
            .add_event_source(
                &mut template,
                &create_sqs_event_source(
                    &pair.queue,
                    &SqsEventSourceProps {
                        batch_size: 10,
                        max_batching_window: Duration::from_secs(5),
                        report_batch_item_failures: true,
                    },
                ),
            )
            .unwrap();

        assert_eq!(
            template.resource(mapping.logical_id()).unwrap(),
            &json!({
                "Type": "AWS::Lambda::EventSourceMapping",
                "Properties": {
                    "EventSourceArn": {"Fn::GetAtt": [pair.queue.logical_id(), "Arn"]},
                    "FunctionName": {"Ref": function.logical_id()},
                    "BatchSize": 10,
                    "MaximumBatchingWindowInSeconds": 5,
                    "FunctionResponseTypes": ["ReportBatchItemFailures"]
                }
            })
        );

        let role = &template.resource(function.role().logical_id()).unwrap()["Properties"];
        let statements = &role["Policies"][0]["PolicyDocument"]["Statement"];

        assert_eq!(statements[0]["Action"][0], "sqs:ChangeMessageVisibility");
        assert_eq!(
            statements[0]["Resource"],
            json!([{"Fn::GetAtt": [pair.queue.logical_id(), "Arn"]}])
        );
    }

    #[test]
    fn batch_failures_reporting_is_optional() {
        let mut template = template();
        let pair = orders(&mut template);

        let function = create_function(
            &mut template,
            &FunctionProps {
                name: "OrdersHandler".into(),
                ..Default::default()
            },
            "dev",
        )
        .unwrap();

        let source = create_sqs_event_source(
            &pair.queue,
            &SqsEventSourceProps {
                batch_size: 1,
                max_batching_window: Duration::ZERO,
                report_batch_item_failures: false,
            },
        );

        let mapping = function.add_event_source(&mut template, &source).unwrap();
        let properties: &Value = &template.resource(mapping.logical_id()).unwrap()["Properties"];

        assert_eq!(properties["FunctionResponseTypes"], json!([]));
        assert_eq!(properties["MaximumBatchingWindowInSeconds"], 0);

        // The same queue can't be bound to the same function twice
        assert!(function.add_event_source(&mut template, &source).is_err());
    }
}
