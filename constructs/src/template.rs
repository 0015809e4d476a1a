mod asset;
#[allow(clippy::module_inception)]
mod template;
pub use asset::Asset;
pub use template::{CfnResource, Handle, Template};
pub(crate) use template::seconds;
