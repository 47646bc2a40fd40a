use std::str::Utf8Error;
use wasm_bindgen::JsValue;

/// Failures of the action registry: decoding a tagged action or checking
/// that a tag agrees with the variant it carries.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ActionError {
    #[error("unsupported action type '{0}'")]
    UnsupportedActionType(String),

    #[error("action type '{tag}' does not match its '{actual}' parameters")]
    ActionTypeMismatch { tag: String, actual: &'static str },

    #[error("invalid parameters for action '{tag}': {message}")]
    InvalidParams { tag: String, message: String },
}

/// Structural, range, or enumeration violation in a Waylines mission.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("field '{field}' is required")]
    Required { field: String },

    #[error("field '{field}' value {value} violates rule '{rule}'")]
    OutOfRange {
        field: String,
        value: f64,
        rule: &'static str,
    },

    #[error("field '{field}' value '{value}' violates rule '{rule}'")]
    InvalidValue {
        field: String,
        value: String,
        rule: &'static str,
    },

    #[error("field '{field}' is required for model {model}")]
    RequiredForModel { field: String, model: String },

    #[error("{field}: {source}")]
    Action {
        field: String,
        #[source]
        source: ActionError,
    },

    #[error("malformed waylines document: {0}")]
    Malformed(String),

    #[error("invalid conditional rule pattern: {0}")]
    InvalidRule(String),
}

/// Why a single waypoint could not be converted.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConversionCause {
    #[error(transparent)]
    Action(#[from] ActionError),

    #[error("mission has no waypoints")]
    EmptyMission,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("waypoint {index}: {source}")]
pub struct ConversionError {
    pub index: usize,
    #[source]
    pub source: ConversionCause,
}

#[derive(Debug, thiserror::Error)]
pub enum SerializationError {
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("XML write error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML is not valid UTF-8: {0}")]
    Encoding(#[from] Utf8Error),

    #[error("expected <{expected}> root element, found <{found}>")]
    UnexpectedRoot {
        expected: &'static str,
        found: String,
    },

    #[error("missing <{0}> element")]
    MissingElement(&'static str),

    #[error("element <{0}> is never closed")]
    UnclosedElement(String),

    #[error("content outside the root element: {0}")]
    ExtraContent(String),

    #[error("invalid number '{value}' in <{element}>")]
    InvalidNumber { element: String, value: String },
}

impl From<quick_xml::events::attributes::AttrError> for SerializationError {
    fn from(e: quick_xml::events::attributes::AttrError) -> Self {
        Self::Xml(e.into())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PackagingError {
    #[error("mission has no {0} document")]
    MissingDocument(&'static str),

    #[error("KMZ format incorrect: no entry ending in '{missing}'")]
    KmzFormatIncorrect { missing: &'static str },

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serialization(#[from] SerializationError),
}

/// Pipeline error, tagged with the stage that failed.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("conversion failed: {0}")]
    Conversion(#[from] ConversionError),

    #[error("serialization failed: {0}")]
    Serialization(#[from] SerializationError),

    #[error("packaging failed: {0}")]
    Packaging(#[from] PackagingError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl From<Error> for JsValue {
    fn from(e: Error) -> Self {
        JsValue::from_str(&e.to_string())
    }
}
