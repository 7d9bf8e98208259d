//! Items and the parser output container.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::request::Request;

/// An ordered mapping from field names to opaque values, produced by a user
/// parser. The engine never interprets the contents; it only moves items from
/// the analyze stage into the process chain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Item(Map<String, Value>);

impl Item {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

impl From<Map<String, Value>> for Item {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

/// Everything one parser extracted from one response: items to store,
/// follow-up requests to schedule, and errors to surface.
#[derive(Default)]
pub struct ParseOutput {
    items: Vec<Item>,
    requests: Vec<Request>,
    errors: Vec<anyhow::Error>,
}

impl ParseOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_item(&mut self, item: Item) {
        self.items.push(item);
    }

    pub fn add_request(&mut self, request: Request) {
        self.requests.push(request);
    }

    pub fn add_error(&mut self, error: anyhow::Error) {
        self.errors.push(error);
    }

    /// Appends another parser's output, preserving per-parser order.
    pub fn extend(&mut self, other: ParseOutput) {
        self.items.extend(other.items);
        self.requests.extend(other.requests);
        self.errors.extend(other.errors);
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.requests.is_empty() && self.errors.is_empty()
    }

    pub fn into_parts(self) -> (Vec<Item>, Vec<Request>, Vec<anyhow::Error>) {
        (self.items, self.requests, self.errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn item_keeps_insertion_independent_field_access() {
        let mut item = Item::new();
        item.insert("url", "http://h.test/");
        item.insert("depth", json!(2));
        assert_eq!(item.get("url"), Some(&json!("http://h.test/")));
        assert_eq!(item.len(), 2);
    }

    #[test]
    fn parse_output_concatenates_in_order() {
        let mut first = ParseOutput::new();
        first.add_request(Request::get("http://h.test/a").unwrap());
        let mut second = ParseOutput::new();
        second.add_request(Request::get("http://h.test/b").unwrap());
        second.add_error(anyhow::anyhow!("bad markup"));

        first.extend(second);
        let (items, requests, errors) = first.into_parts();
        assert!(items.is_empty());
        assert_eq!(requests[0].url().as_str(), "http://h.test/a");
        assert_eq!(requests[1].url().as_str(), "http://h.test/b");
        assert_eq!(errors.len(), 1);
    }
}
