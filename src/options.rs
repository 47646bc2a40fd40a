use serde::Deserialize;

/// Author written into template documents unless overridden.
pub const DEFAULT_AUTHOR: &str = "wpmz-codec";

/// Options for Waylines to WPML/KMZ conversion.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertOptions {
    /// Author string for the template document (default: "wpmz-codec")
    #[serde(default)]
    pub author: Option<String>,

    /// Fixed create/update timestamp in milliseconds (default: current time)
    #[serde(default)]
    pub timestamp_ms: Option<i64>,

    /// Indent the XML documents (default: true)
    #[serde(default = "default_true")]
    pub indent: bool,

    /// Validate the mission before converting it (default: true)
    #[serde(default = "default_true")]
    pub validate: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            author: None,
            timestamp_ms: None,
            indent: true,
            validate: true,
        }
    }
}

impl ConvertOptions {
    pub fn author(&self) -> &str {
        self.author.as_deref().unwrap_or(DEFAULT_AUTHOR)
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp_ms
            .unwrap_or_else(|| chrono::Utc::now().timestamp_millis())
    }
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_object() {
        let opts: ConvertOptions = serde_json::from_str("{}").unwrap();
        assert!(opts.indent);
        assert!(opts.validate);
        assert_eq!(opts.author(), DEFAULT_AUTHOR);
    }

    #[test]
    fn test_fixed_clock() {
        let opts: ConvertOptions =
            serde_json::from_str(r#"{"timestampMs": 1700000000000, "author": "ops"}"#).unwrap();
        assert_eq!(opts.timestamp(), 1_700_000_000_000);
        assert_eq!(opts.author(), "ops");
    }
}
