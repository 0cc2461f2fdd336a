//! Conversion rules matched against visited URLs after a confirmed exposure.

use serde::{Deserialize, Serialize};

use super::ConfirmationType;

/// The exposure kind a conversion rule keys on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionType {
    PostView,
    PostClick,
}

impl ConversionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversionType::PostView => "postview",
            ConversionType::PostClick => "postclick",
        }
    }

    /// Parse the catalog wire value.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "postview" => Some(ConversionType::PostView),
            "postclick" => Some(ConversionType::PostClick),
            _ => None,
        }
    }

    /// The prior confirmation a conversion of this type requires.
    pub fn required_confirmation(&self) -> ConfirmationType {
        match self {
            ConversionType::PostView => ConfirmationType::View,
            ConversionType::PostClick => ConfirmationType::Click,
        }
    }
}

/// A conversion rule from the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdConversion {
    pub creative_set_id: String,
    pub conversion_type: ConversionType,
    /// Wildcard pattern; `*` matches any run of characters.
    pub url_pattern: String,
    /// Days from the confirmed exposure during which a visit converts.
    pub observation_window: u32,
}

/// A matched conversion waiting for its redemption timer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedConversion {
    pub creative_instance_id: String,
    pub creative_set_id: String,
    pub conversion_type: ConversionType,
    /// When the queued confirmation becomes due.
    pub process_at: chrono::DateTime<chrono::Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion_type_parse() {
        assert_eq!(ConversionType::parse("postview"), Some(ConversionType::PostView));
        assert_eq!(ConversionType::parse("postclick"), Some(ConversionType::PostClick));
        assert_eq!(ConversionType::parse("postlanded"), None);
    }

    #[test]
    fn test_required_confirmation() {
        assert_eq!(
            ConversionType::PostView.required_confirmation(),
            ConfirmationType::View
        );
        assert_eq!(
            ConversionType::PostClick.required_confirmation(),
            ConfirmationType::Click
        );
    }
}
