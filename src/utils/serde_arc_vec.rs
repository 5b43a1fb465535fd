//! Serde adapter for `Vec<Arc<T>>` fields (e.g. union inputs).

use std::sync::Arc;

use serde::{ser::SerializeSeq, Deserialize, Deserializer, Serialize, Serializer};

pub fn serialize<S, T>(values: &Vec<Arc<T>>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    T: Serialize + 'static,
{
    let mut seq = serializer.serialize_seq(Some(values.len()))?;
    for value in values {
        seq.serialize_element(value.as_ref())?;
    }
    seq.end()
}

pub fn deserialize<'de, D, T>(deserializer: D) -> Result<Vec<Arc<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + 'static,
{
    let values = Vec::<T>::deserialize(deserializer)?;
    Ok(values.into_iter().map(Arc::new).collect())
}
