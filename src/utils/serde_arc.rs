//! Serde adapter for `Arc<T>` plan/expression fields: serialize through the
//! pointee, re-wrap on deserialization. Use with `#[serde(with = ...)]`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub fn serialize<S, T>(value: &Arc<T>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
    T: Serialize,
{
    T::serialize(value.as_ref(), serializer)
}

pub fn deserialize<'de, D, T>(deserializer: D) -> Result<Arc<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Arc::new)
}
