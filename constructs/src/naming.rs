/// Unique name of a resource within an account
///
/// The stage suffix keeps resources of different environments apart.
/// No validation of length or allowed characters is performed.
pub fn physical_name(logical_name: &str, stage: &str) -> String {
    format!("{logical_name}-{stage}")
}

/// ARN of a function role declared with the `{lambda_name}-Role` name
///
/// Used to reference the role from other stacks.
pub fn role_arn(account_id: &str, lambda_name: &str, stage: &str) -> String {
    format!(
        "arn:aws:iam::{account_id}:role/{}",
        physical_name(&format!("{lambda_name}-Role"), stage)
    )
}

/// Replace any unwanted character in resource name
/// with its uppercase-alpha counterpart
///
/// Anything else which is not alphanumeric is dropped, as CloudFormation
/// only accepts [A-Za-z0-9] in logical ids.
pub fn escape_resource_name(name: &str) -> String {
    name.replace("@", "AT")
        .replace(".", "DOT")
        .replace("-", "HYPHEN")
        .replace("_", "UNDRSC")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

/// Key of a resource in the template, e.g. "RoleFooHYPHENdev"
pub fn logical_id(kind: &str, physical_name: &str) -> String {
    format!("{kind}{}", escape_resource_name(physical_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn physical_name_appends_stage() {
        for (name, stage) in [("Foo", "dev"), ("orders-api", "prod"), ("", "")] {
            assert_eq!(physical_name(name, stage), format!("{name}-{stage}"));
        }
    }

    #[test]
    fn role_arn_uses_role_suffix() {
        assert_eq!(
            role_arn("123456789012", "Orders", "dev"),
            "arn:aws:iam::123456789012:role/Orders-Role-dev"
        );

        // Account id is not validated
        assert_eq!(role_arn("", "A", "b"), "arn:aws:iam:::role/A-Role-b");
    }

    #[test]
    fn escaped_names_are_alphanumeric() {
        assert_eq!(
            escape_resource_name("me@mail.com_orders-dev"),
            "meATmailDOTcomUNDRSCordersHYPHENdev"
        );

        assert_eq!(escape_resource_name("a/b c:d"), "abcd");
        assert_eq!(logical_id("Queue", "Orders-dev"), "QueueOrdersHYPHENdev");
    }
}
