//! Base implementation of records for logging.
use crate::error::RrdError;
use chrono::prelude::{DateTime, Local};
use std::collections::{
    hash_map::{IntoIter, Iter, Keys},
    HashMap,
};

/// Represents possible types of values that can be stored in a [`Record`].
#[derive(Debug, Clone)]
pub enum RecordValue {
    /// A single floating-point value, typically used for metrics like loss or return.
    Scalar(f32),

    /// A timestamp with local timezone.
    DateTime(DateTime<Local>),

    /// A 1-dimensional array of floating-point values.
    Array1(Vec<f32>),

    /// A text value.
    String(String),
}

/// A container for storing key-value pairs of various data types.
///
/// ```rust
/// use rrd_core::record::{Record, RecordValue};
///
/// let mut record = Record::from_scalar("loss_critic", 0.5);
/// record.insert("state_min", RecordValue::Array1(vec![-1.0, -2.0]));
///
/// assert_eq!(record.get_scalar("loss_critic").unwrap(), 0.5);
/// ```
#[derive(Debug, Clone)]
pub struct Record(HashMap<String, RecordValue>);

impl Record {
    /// Creates an empty record.
    pub fn empty() -> Self {
        Self(HashMap::new())
    }

    /// Creates a record containing a single scalar value.
    pub fn from_scalar(name: impl Into<String>, value: f32) -> Self {
        Self(HashMap::from([(name.into(), RecordValue::Scalar(value))]))
    }

    /// Creates a record from a slice of key-value pairs.
    pub fn from_slice<K: Into<String> + Clone>(s: &[(K, RecordValue)]) -> Self {
        Self(
            s.iter()
                .map(|(k, v)| (k.clone().into(), v.clone()))
                .collect(),
        )
    }

    /// Returns an iterator over the keys in the record.
    pub fn keys(&self) -> Keys<String, RecordValue> {
        self.0.keys()
    }

    /// Inserts a key-value pair into the record.
    pub fn insert(&mut self, k: impl Into<String>, v: RecordValue) {
        self.0.insert(k.into(), v);
    }

    /// Returns an iterator over the key-value pairs in the record.
    pub fn iter(&self) -> Iter<'_, String, RecordValue> {
        self.0.iter()
    }

    /// Returns an iterator that consumes the record.
    pub fn into_iter_in_record(self) -> IntoIter<String, RecordValue> {
        self.0.into_iter()
    }

    /// Gets a reference to the value associated with the given key.
    pub fn get(&self, k: &str) -> Option<&RecordValue> {
        self.0.get(k)
    }

    /// Merges two records, consuming both.
    ///
    /// Values of `record` overwrite values of `self` with the same key.
    pub fn merge(self, record: Record) -> Self {
        Record(self.0.into_iter().chain(record.0).collect())
    }

    /// Merges another record into this one in place.
    pub fn merge_inplace(&mut self, record: Record) {
        self.0.extend(record.0);
    }

    /// Gets a scalar value from the record.
    pub fn get_scalar(&self, k: &str) -> Result<f32, RrdError> {
        if let Some(v) = self.0.get(k) {
            match v {
                RecordValue::Scalar(v) => Ok(*v),
                _ => Err(RrdError::RecordValueTypeError("Scalar".to_string())),
            }
        } else {
            Err(RrdError::RecordKeyError(k.to_string()))
        }
    }

    /// Gets a 1-dimensional array from the record.
    pub fn get_array1(&self, k: &str) -> Result<Vec<f32>, RrdError> {
        if let Some(v) = self.0.get(k) {
            match v {
                RecordValue::Array1(v) => Ok(v.clone()),
                _ => Err(RrdError::RecordValueTypeError("Array1".to_string())),
            }
        } else {
            Err(RrdError::RecordKeyError(k.to_string()))
        }
    }

    /// Gets a string value from the record.
    pub fn get_string(&self, k: &str) -> Result<String, RrdError> {
        if let Some(v) = self.0.get(k) {
            match v {
                RecordValue::String(s) => Ok(s.clone()),
                _ => Err(RrdError::RecordValueTypeError("String".to_string())),
            }
        } else {
            Err(RrdError::RecordKeyError(k.to_string()))
        }
    }

    /// Returns `true` if the record contains no key-value pairs.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_merge_overwrites() {
        let a = Record::from_slice(&[
            ("loss_actor", RecordValue::Scalar(1.0)),
            ("loss_critic", RecordValue::Scalar(2.0)),
        ]);
        let b = Record::from_scalar("loss_critic", 3.0);
        let c = a.merge(b);

        assert_eq!(c.get_scalar("loss_actor").unwrap(), 1.0);
        assert_eq!(c.get_scalar("loss_critic").unwrap(), 3.0);
    }

    #[test]
    fn test_typed_getters() {
        let mut record = Record::empty();
        assert!(record.is_empty());
        record.insert("state_min", RecordValue::Array1(vec![0.0, 1.0]));

        assert_eq!(record.get_array1("state_min").unwrap(), vec![0.0, 1.0]);
        assert!(matches!(
            record.get_scalar("state_min"),
            Err(RrdError::RecordValueTypeError(_))
        ));
        assert!(matches!(
            record.get_scalar("missing"),
            Err(RrdError::RecordKeyError(_))
        ));
    }
}
