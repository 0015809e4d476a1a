use crate::config::CommonProps;
use serde::Serialize;
use serde_json::{json, Value};
use eyre::WrapErr;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Local code referenced by the template
///
/// The template only points to the destination, publishing (zipping and
/// uploading a directory, building and pushing an image) is done outside.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Asset {
    /// A directory published as a zip archive to S3
    File {
        path: PathBuf,
        bucket: String,
        key: String,
    },

    /// A container build context published to ECR
    Image {
        path: PathBuf,
        repository: String,
        tag: String,
    },
}

/// Hash of the asset contents, used in S3 keys and image tags
///
/// Every file is hashed together with its path relative to the asset root,
/// in file name order. A path which does not exist yet (code not built) is
/// hashed by its name, there is nothing to publish for it anyway.
fn fingerprint(path: &Path) -> eyre::Result<String> {
    if !path.exists() {
        log::warn!("Asset {path:?} does not exist, fingerprinting by path");
        return Ok(sha256::digest(path.to_string_lossy().to_string()));
    }

    let mut digests = vec![];

    for entry in WalkDir::new(path).sort_by_file_name() {
        let entry = entry.wrap_err_with(|| format!("Failed to walk asset {path:?}"))?;

        if !entry.file_type().is_file() {
            continue;
        }

        let content = fs::read(entry.path())
            .wrap_err_with(|| format!("Failed to read {:?}", entry.path()))?;

        let relative = entry.path().strip_prefix(path).unwrap_or(entry.path());

        digests.push(format!(
            "{} {}",
            relative.to_string_lossy(),
            sha256::digest(content.as_slice())
        ));
    }

    Ok(sha256::digest(digests.join("\n")))
}

impl Asset {
    /// A directory to zip, keyed by its contents
    pub fn file(path: &Path, bucket: &str) -> eyre::Result<Self> {
        Ok(Asset::File {
            path: path.to_path_buf(),
            bucket: bucket.to_string(),
            key: format!("assets/{}.zip", fingerprint(path)?),
        })
    }

    /// A build context, tagged by its contents
    pub fn image(path: &Path, repository: &str) -> eyre::Result<Self> {
        Ok(Asset::Image {
            path: path.to_path_buf(),
            repository: repository.to_string(),
            tag: fingerprint(path)?,
        })
    }

    pub fn path(&self) -> &Path {
        match self {
            Asset::File { path, .. } | Asset::Image { path, .. } => path,
        }
    }

    /// The "Code" property of a function built from the asset
    pub fn code(&self, props: &CommonProps) -> Value {
        match self {
            Asset::File { bucket, key, .. } => json!({"S3Bucket": bucket, "S3Key": key}),

            Asset::Image {
                repository, tag, ..
            } => json!({
                "ImageUri": format!(
                    "{account_id}.dkr.ecr.{region}.amazonaws.com/{repository}:{tag}",
                    account_id = props.account_id,
                    region = props.region,
                )
            }),
        }
    }
}
