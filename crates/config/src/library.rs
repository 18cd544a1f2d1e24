use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const REDACTED: &str = "********";

/// Where a library's objects live.
///
/// ```toml
/// [libraries.docs]
/// type = "local"
/// path = "/srv/docs"
///
/// [libraries.miniofiles]
/// type = "s3"
/// bucket = "filestore"
/// region = "us-east-1"
/// endpoint = "http://minio:9000"
/// key_id = "..."
/// key_secret = "..."
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LibraryConfig {
    Local {
        path: PathBuf,
    },
    S3 {
        bucket: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        prefix: Option<String>,
        region: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        endpoint: Option<String>,
        key_id: String,
        key_secret: String,
    },
}
impl LibraryConfig {
    /// Copy with credentials masked, safe to print.
    pub fn redacted(&self) -> Self {
        match self {
            Self::Local { .. } => self.clone(),
            Self::S3 { bucket, prefix, region, endpoint, key_id, .. } => Self::S3 {
                bucket: bucket.clone(),
                prefix: prefix.clone(),
                region: region.clone(),
                endpoint: endpoint.clone(),
                key_id: key_id.clone(),
                key_secret: REDACTED.to_string(),
            },
        }
    }

    pub(crate) fn problem(&self) -> Option<&'static str> {
        match self {
            Self::Local { path } if !path.is_absolute() => Some("path must be absolute"),
            Self::S3 { bucket, .. } if bucket.trim().is_empty() => Some("bucket must not be empty"),
            Self::S3 { region, .. } if region.trim().is_empty() => Some("region must not be empty"),
            _ => None,
        }
    }
}
