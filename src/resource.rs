use anyhow::{Error, anyhow};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Server state for one resource, as returned by the API.
///
/// Key order is preserved (`serde_json` is built with `preserve_order`), so a
/// document sent back to the server keeps the layout it was received with.
pub type Document = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceType {
    Source,
    Dataset,
    Model,
    Prediction,
    TimeSeries,
    Forecast,
}

impl ResourceType {
    pub const ALL: [ResourceType; 6] = [
        ResourceType::Source,
        ResourceType::Dataset,
        ResourceType::Model,
        ResourceType::Prediction,
        ResourceType::TimeSeries,
        ResourceType::Forecast,
    ];

    /// Id prefix and endpoint path segment, e.g. `timeseries`.
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceType::Source => "source",
            ResourceType::Dataset => "dataset",
            ResourceType::Model => "model",
            ResourceType::Prediction => "prediction",
            ResourceType::TimeSeries => "timeseries",
            ResourceType::Forecast => "forecast",
        }
    }

    /// Classifies an id by its prefix. Does not check the suffix.
    pub fn from_id(id: &str) -> Option<Self> {
        let (prefix, _) = id.split_once('/')?;
        prefix.parse().ok()
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| anyhow!("unknown resource type [{}]", s))
    }
}

/// How one creatable resource type is wired to the upstream resource it is
/// built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceKind {
    /// Type of the resources this kind creates and addresses.
    pub resource: ResourceType,
    /// Type of the upstream resource passed to `create`.
    pub dependency: ResourceType,
    /// Request field carrying the dependency id.
    pub dependency_field: &'static str,
    /// Request field carrying the input payload.
    pub input_field: &'static str,
}

impl ResourceKind {
    /// Forecasts, created from a time series.
    pub const FORECAST: ResourceKind = ResourceKind {
        resource: ResourceType::Forecast,
        dependency: ResourceType::TimeSeries,
        dependency_field: "timeseries",
        input_field: "input_data",
    };

    /// Predictions, created from a model.
    pub const PREDICTION: ResourceKind = ResourceKind {
        resource: ResourceType::Prediction,
        dependency: ResourceType::Model,
        dependency_field: "model",
        input_field: "input_data",
    };

    /// Listing and creation endpoint, relative to the API base URL.
    pub fn endpoint(&self) -> &'static str {
        self.resource.as_str()
    }
}

/// The canonical id held by a document.
///
/// Accepts both bare documents (`{"resource": ...}`) and wrapped ones
/// (`{"object": {"resource": ...}}`).
pub fn resource_id(document: &Document) -> Option<&str> {
    document
        .get("resource")
        .or_else(|| document.get("object").and_then(|o| o.get("resource")))
        .and_then(Value::as_str)
}
