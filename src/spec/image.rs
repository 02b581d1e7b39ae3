//! Machine-image selection criteria.
//!
//! The image catalog itself is external; this module only turns the selection
//! into the public SSM parameter path the catalog publishes the latest image id
//! under, e.g. `/aws/service/ami-amazon-linux-latest/amzn-ami-hvm-x86_64-gp2`.

use serde::{Deserialize, Serialize};

const LATEST_PREFIX: &str = "/aws/service/ami-amazon-linux-latest";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Generation {
    #[default]
    AmazonLinux,
    AmazonLinux2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Edition {
    #[default]
    Standard,
    Minimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Virtualization {
    #[default]
    Hvm,
    Pv,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Storage {
    #[default]
    GeneralPurpose,
    Ebs,
    S3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageSelection {
    pub generation: Generation,
    pub edition: Edition,
    pub virtualization: Virtualization,
    pub storage: Storage,
}

impl ImageSelection {
    pub fn ssm_parameter(&self) -> String {
        let generation = match self.generation {
            Generation::AmazonLinux => "amzn",
            Generation::AmazonLinux2 => "amzn2",
        };
        let edition = match self.edition {
            Edition::Standard => None,
            Edition::Minimal => Some("minimal"),
        };
        let virtualization = match self.virtualization {
            Virtualization::Hvm => "hvm",
            Virtualization::Pv => "pv",
        };
        let storage = match self.storage {
            Storage::GeneralPurpose => "gp2",
            Storage::Ebs => "ebs",
            Storage::S3 => "s3",
        };

        let parts: Vec<&str> = [
            Some(generation),
            Some("ami"),
            edition,
            Some(virtualization),
            Some("x86_64"),
            Some(storage),
        ]
        .into_iter()
        .flatten()
        .collect();

        format!("{}/{}", LATEST_PREFIX, parts.join("-"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_selection_is_standard_amazon_linux() {
        assert_eq!(
            ImageSelection::default().ssm_parameter(),
            "/aws/service/ami-amazon-linux-latest/amzn-ami-hvm-x86_64-gp2"
        );
    }

    #[test]
    fn minimal_edition_is_named() {
        let sel = ImageSelection {
            generation: Generation::AmazonLinux2,
            edition: Edition::Minimal,
            virtualization: Virtualization::Hvm,
            storage: Storage::Ebs,
        };
        assert_eq!(
            sel.ssm_parameter(),
            "/aws/service/ami-amazon-linux-latest/amzn2-ami-minimal-hvm-x86_64-ebs"
        );
    }

    #[test]
    fn deserializes_partial_selection() {
        let sel: ImageSelection = serde_json::from_str(r#"{"storage": "ebs"}"#).unwrap();
        assert_eq!(sel.storage, Storage::Ebs);
        assert_eq!(sel.generation, Generation::AmazonLinux);
    }
}
