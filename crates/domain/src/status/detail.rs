use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::severity::StatusCode;
use super::template::render_template;

pub(crate) mod private {
    pub trait Sealed {}
}

/// A closed set of status codes owned by one integration.
///
/// Each variant carries exactly the context its template needs. The trait
/// is sealed: only catalogs in this crate can produce a `StatusDetail`.
pub trait StatusCatalog: private::Sealed {
    /// Stable wire identifier, e.g. `DEVICE_COMMAND_REJECTED`
    fn code(&self) -> &'static str;
    fn severity(&self) -> StatusCode;
    fn default_template(&self) -> &'static str;
    /// Interpolation payload, camelCase keys
    fn context(&self) -> Map<String, Value>;
}

/// Wire shape `{code, context}`; severity and template ride along
/// for local rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusDetail {
    pub code: String,
    pub context: Map<String, Value>,
    #[serde(skip)]
    severity: StatusCode,
    #[serde(skip)]
    template: Option<&'static str>,
}

impl StatusDetail {
    /// The only way to build a detail
    pub fn new(entry: impl StatusCatalog) -> Self {
        Self {
            code: entry.code().to_string(),
            context: entry.context(),
            severity: entry.severity(),
            template: Some(entry.default_template()),
        }
    }

    pub fn severity(&self) -> StatusCode {
        self.severity
    }

    pub fn default_template(&self) -> Option<&'static str> {
        self.template
    }

    /// Render with the catalog default template
    pub fn message(&self) -> String {
        match self.template {
            Some(template) => render_template(template, &self.context),
            None => self.code.clone(),
        }
    }
}

/// Host-supplied message templates keyed by status code
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusTemplates {
    overrides: HashMap<String, String>,
}

impl StatusTemplates {
    pub fn new(overrides: HashMap<String, String>) -> Self {
        Self { overrides }
    }

    pub fn with(mut self, code: impl Into<String>, template: impl Into<String>) -> Self {
        self.overrides.insert(code.into(), template.into());
        self
    }

    /// Override template if one exists for the code, else the default
    pub fn render(&self, detail: &StatusDetail) -> String {
        match self.overrides.get(&detail.code) {
            Some(template) => render_template(template, &detail.context),
            None => detail.message(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty()
    }
}

/// Turn a `json!` object into a context map
pub(crate) fn context_map(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
