// Storable: JSON mapping form with a per-type ignore list.
// The same list drives both the persisted form and value equality.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

pub trait Storable: Serialize + DeserializeOwned {
    /// Field names dropped from the persisted mapping and skipped by `storable_eq`.
    const IGNORED_FIELDS: &'static [&'static str];

    /// Persisted mapping: every serialized field except `IGNORED_FIELDS`.
    fn raw(&self) -> serde_json::Result<Map<String, Value>> {
        let value = serde_json::to_value(self)?;
        let Value::Object(mut map) = value else {
            return Err(serde::ser::Error::custom("storable must serialize as a map"));
        };
        for name in Self::IGNORED_FIELDS {
            map.remove(*name);
        }
        Ok(map)
    }

    /// Rebuild from a persisted mapping. Ignored fields take their serde defaults.
    fn from_raw(raw: Map<String, Value>) -> serde_json::Result<Self> {
        serde_json::from_value(Value::Object(raw))
    }
}

/// Field-by-field equality over the persisted form.
pub fn storable_eq<T: Storable>(a: &T, b: &T) -> bool {
    match (a.raw(), b.raw()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
