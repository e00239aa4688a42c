//! # Cloud Provider Tag
//!
//! One enum, three variants, exhaustive `match` everywhere. Connector
//! dispatch is keyed by this type rather than by untyped provider strings,
//! so an unsupported provider is unrepresentable past the input boundary.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A supported cloud provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloudProvider {
    /// Amazon Web Services.
    Aws,
    /// Microsoft Azure.
    Azure,
    /// Google Cloud Platform.
    Gcp,
}

impl CloudProvider {
    /// All supported providers, in scan order.
    pub const ALL: [CloudProvider; 3] = [Self::Aws, Self::Azure, Self::Gcp];

    /// Return the lowercase string value used on the wire and in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Aws => "aws",
            Self::Azure => "azure",
            Self::Gcp => "gcp",
        }
    }
}

impl std::fmt::Display for CloudProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CloudProvider {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "aws" => Ok(Self::Aws),
            "azure" => Ok(Self::Azure),
            "gcp" => Ok(Self::Gcp),
            other => Err(ValidationError::UnknownProvider(other.to_string())),
        }
    }
}
