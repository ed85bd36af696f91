//! API description: the declarative input both Service and Client are built from.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::SetupError;

/// Where the API is served.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoint {
    pub scheme: String,
    pub host: String,
    pub port: u16,
    /// Path template with `{version}` and `{operation}` placeholders.
    pub path: String,
}

impl Default for Endpoint {
    fn default() -> Self {
        Self {
            scheme: "https".to_string(),
            host: "localhost".to_string(),
            port: 8080,
            path: "/api/{version}/{operation}".to_string(),
        }
    }
}

impl Endpoint {
    /// Absolute URL a client posts `operation` to.
    #[must_use]
    pub fn client_url(&self, version: &str, operation: &str) -> String {
        format!(
            "{}://{}:{}{}",
            self.scheme,
            self.host,
            self.port,
            self.path
                .replace("{version}", version)
                .replace("{operation}", operation)
        )
    }
}

/// Declarative description of one API.
///
/// Unknown top-level keys are preserved in `metadata`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiDescription {
    pub version: String,
    /// Client round-trip timeout in seconds.
    pub timeout: u64,
    /// Let undeclared failures cross the wire with their real name and message.
    pub debug: bool,
    pub endpoint: Endpoint,
    pub operations: BTreeSet<String>,
    pub exceptions: BTreeSet<String>,
    #[serde(flatten)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl Default for ApiDescription {
    fn default() -> Self {
        Self {
            version: "0".to_string(),
            timeout: 60,
            debug: false,
            endpoint: Endpoint::default(),
            operations: BTreeSet::new(),
            exceptions: BTreeSet::new(),
            metadata: BTreeMap::new(),
        }
    }
}

impl ApiDescription {
    /// Description with the given operations and exceptions and defaults for
    /// everything else.
    pub fn new<O, E>(operations: O, exceptions: E) -> Self
    where
        O: IntoIterator,
        O::Item: Into<String>,
        E: IntoIterator,
        E::Item: Into<String>,
    {
        Self {
            operations: operations.into_iter().map(Into::into).collect(),
            exceptions: exceptions.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// # Errors
    ///
    /// Returns `SetupError::Description` if `json` is not a valid description.
    pub fn from_json_str(json: &str) -> Result<Self, SetupError> {
        serde_json::from_str(json).map_err(|e| SetupError::Description {
            reason: e.to_string(),
        })
    }

    /// # Errors
    ///
    /// Returns `SetupError::Description` if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SetupError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| SetupError::Description {
            reason: format!("{}: {e}", path.display()),
        })?;
        Self::from_json_str(&json)
    }

    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    #[must_use]
    pub fn with_endpoint(mut self, endpoint: Endpoint) -> Self {
        self.endpoint = endpoint;
        self
    }

    #[must_use]
    pub fn declares_operation(&self, name: &str) -> bool {
        self.operations.contains(name)
    }

    #[must_use]
    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// Client URL for `operation` under this description's version.
    #[must_use]
    pub fn client_url(&self, operation: &str) -> String {
        self.endpoint.client_url(&self.version, operation)
    }
}

/// Compiled server-side matcher for the endpoint path template.
#[derive(Debug, Clone)]
pub struct PathPattern {
    regex: Regex,
}

impl PathPattern {
    /// Compiles `endpoint.path` for `version`. The `{operation}` placeholder
    /// captures a single path segment and a trailing slash is tolerated.
    ///
    /// # Errors
    ///
    /// Returns `SetupError::InvalidTemplate` if the template does not contain
    /// exactly one `{operation}` placeholder.
    pub fn compile(endpoint: &Endpoint, version: &str) -> Result<Self, SetupError> {
        let invalid = |reason: &str| SetupError::InvalidTemplate {
            template: endpoint.path.clone(),
            reason: reason.to_string(),
        };

        let path = endpoint.path.replace("{version}", version);
        let (prefix, suffix) = path
            .split_once("{operation}")
            .ok_or_else(|| invalid("missing {operation} placeholder"))?;
        if suffix.contains("{operation}") {
            return Err(invalid("{operation} placeholder appears more than once"));
        }

        let pattern = format!(
            "^{}(?P<operation>[^/]+){}/?$",
            regex::escape(prefix),
            regex::escape(suffix.trim_end_matches('/'))
        );
        let regex = Regex::new(&pattern).map_err(|e| invalid(&e.to_string()))?;
        Ok(Self { regex })
    }

    /// Operation name carried by `path`, if it matches the template.
    #[must_use]
    pub fn operation<'p>(&self, path: &'p str) -> Option<&'p str> {
        self.regex
            .captures(path)
            .and_then(|caps| caps.name("operation"))
            .map(|m| m.as_str())
    }
}
