//! Query-string serialization for descriptor URLs.
//!
//! Parameters are serialized into the URL before a descriptor reaches the
//! executor. Null values are skipped, list values repeat their key once per
//! non-null element, and everything else is coerced to its string form.
//! Keys keep insertion order and list elements keep their order.

use serde_json::Value;
use url::form_urlencoded;

/// A single query parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryValue {
    Null,
    Scalar(String),
    List(Vec<Option<String>>),
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        QueryValue::Scalar(value.to_string())
    }
}

impl From<String> for QueryValue {
    fn from(value: String) -> Self {
        QueryValue::Scalar(value)
    }
}

impl From<&String> for QueryValue {
    fn from(value: &String) -> Self {
        QueryValue::Scalar(value.clone())
    }
}

macro_rules! scalar_from_display {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for QueryValue {
                fn from(value: $ty) -> Self {
                    QueryValue::Scalar(value.to_string())
                }
            }
        )*
    };
}

scalar_from_display!(bool, i32, i64, u16, u32, u64, usize, f32, f64);

impl<T: Into<QueryValue>> From<Option<T>> for QueryValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(QueryValue::Null, Into::into)
    }
}

impl<T: Into<QueryValue>> From<Vec<T>> for QueryValue {
    fn from(values: Vec<T>) -> Self {
        let mut items = Vec::with_capacity(values.len());
        for value in values {
            match value.into() {
                QueryValue::Null => items.push(None),
                QueryValue::Scalar(s) => items.push(Some(s)),
                QueryValue::List(inner) => items.extend(inner),
            }
        }
        QueryValue::List(items)
    }
}

impl From<Value> for QueryValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => QueryValue::Null,
            Value::String(s) => QueryValue::Scalar(s),
            Value::Array(items) => QueryValue::from(items),
            other => QueryValue::Scalar(other.to_string()),
        }
    }
}

/// Ordered parameter mapping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryParams {
    entries: Vec<(String, QueryValue)>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        self.push(key, value);
        self
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<QueryValue>) {
        self.entries.push((key.into(), value.into()));
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Flatten into the `(key, value)` pairs that end up in the query string.
    pub fn pairs(&self) -> Vec<(&str, &str)> {
        let mut pairs = Vec::new();
        for (key, value) in &self.entries {
            match value {
                QueryValue::Null => {}
                QueryValue::Scalar(s) => pairs.push((key.as_str(), s.as_str())),
                QueryValue::List(items) => {
                    pairs.extend(items.iter().flatten().map(|s| (key.as_str(), s.as_str())));
                }
            }
        }
        pairs
    }

    /// Form-urlencoded query string without the leading `?`.
    pub fn encode(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (key, value) in self.pairs() {
            serializer.append_pair(key, value);
        }
        serializer.finish()
    }
}

impl<K: Into<String>, V: Into<QueryValue>> FromIterator<(K, V)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = QueryParams::new();
        for (key, value) in iter {
            params.push(key, value);
        }
        params
    }
}

/// Append serialized `params` to `url`, keeping any fragment at the end.
pub fn append_query(url: &str, params: &QueryParams) -> String {
    let encoded = params.encode();
    if encoded.is_empty() {
        return url.to_string();
    }

    let (base, fragment) = match url.find('#') {
        Some(idx) => url.split_at(idx),
        None => (url, ""),
    };
    let separator = match base.find('?') {
        None => "?",
        Some(_) if base.ends_with('?') || base.ends_with('&') => "",
        Some(_) => "&",
    };
    format!("{base}{separator}{encoded}{fragment}")
}
