//! Request parameter bag shared by admin pages and attribute handlers.

use std::collections::BTreeMap;

/// Multi-valued string parameters of one inbound request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestParams {
    values: BTreeMap<String, Vec<String>>,
}

impl RequestParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes an `application/x-www-form-urlencoded` query or body.
    pub fn from_query(query: &str) -> Self {
        let mut params = Self::new();
        for (name, value) in url::form_urlencoded::parse(query.trim_start_matches('?').as_bytes())
        {
            params.insert(name.into_owned(), value.into_owned());
        }
        params
    }

    /// Builder form of `insert`.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    /// Appends one value; repeated names keep every value in order.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.entry(name.into()).or_default().push(value.into());
    }

    /// First value of `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    pub fn get_all(&self, name: &str) -> &[String] {
        self.values
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// True when the first value of `name` is present and not blank.
    pub fn is_set(&self, name: &str) -> bool {
        self.get(name).is_some_and(|value| !value.trim().is_empty())
    }

    /// First value of `name` parsed with `parse_numeric_id`.
    pub fn numeric_id(&self, name: &str) -> Option<i32> {
        self.get(name).and_then(parse_numeric_id)
    }
}

/// Parses an unsigned decimal id.
///
/// Blank values, signs, whitespace and values beyond `i32::MAX` yield `None`.
pub fn parse_numeric_id(value: &str) -> Option<i32> {
    if value.is_empty() || !value.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}
