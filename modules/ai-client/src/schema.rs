use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;

/// Types that can be extracted as structured output from a model response.
///
/// Auto-implemented for anything deriving `JsonSchema` + `Deserialize`.
pub trait StructuredOutput: JsonSchema + DeserializeOwned {
    /// JSON schema used as the forced tool's `input_schema`.
    fn input_schema() -> serde_json::Value {
        let schema = schema_for!(Self);
        let mut value = serde_json::to_value(schema).unwrap_or_default();

        if let serde_json::Value::Object(map) = &mut value {
            map.remove("$schema");
            map.remove("title");
        }

        value
    }

    fn type_name() -> String {
        <Self as JsonSchema>::schema_name()
    }
}

impl<T: JsonSchema + DeserializeOwned> StructuredOutput for T {}
