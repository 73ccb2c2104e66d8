//! Serde adapters that keep NaN floats through human-readable formats.
//!
//! JSON has no NaN, so non-finite values are written as `null` and read back
//! as NaN. Binary formats store the raw float.

/// For a single `f32` field.
pub mod nan_f32 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f32, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() && !value.is_finite() {
            serializer.serialize_none()
        } else {
            serializer.serialize_f32(*value)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f32, D::Error> {
        if deserializer.is_human_readable() {
            Ok(Option::<f32>::deserialize(deserializer)?.unwrap_or(f32::NAN))
        } else {
            f32::deserialize(deserializer)
        }
    }
}

/// For a `Vec<f32>` field.
pub mod nan_vec {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(values: &[f32], serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.collect_seq(values.iter().map(|v| v.is_finite().then_some(*v)))
        } else {
            values.serialize(serializer)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f32>, D::Error> {
        if deserializer.is_human_readable() {
            let values = Vec::<Option<f32>>::deserialize(deserializer)?;
            Ok(values.into_iter().map(|v| v.unwrap_or(f32::NAN)).collect())
        } else {
            Vec::<f32>::deserialize(deserializer)
        }
    }
}
