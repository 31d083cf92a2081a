//! Pagination over listing endpoints.
//!
//! Listing endpoints answer either a bare JSON array or an envelope with
//! page counters and an items array under one of several field names.
//! [`decode_page`] turns either shape into a [`PageShape`] at the boundary;
//! [`Pages`] walks the pages lazily and yields single items.

use std::collections::VecDeque;

use serde_json::Value;

use crate::client::{AuthClient, Call};
use crate::error::CallError;
use crate::http::Transport;

/// Item field names recognised in enveloped pages
pub const DEFAULT_ITEM_KEYS: &[&str] = &["result", "results", "data", "items", "files", "actes"];

/// Decoded listing response
#[derive(Debug, Clone, PartialEq)]
pub enum PageShape {
    /// Bare array: a single, final page
    Bare(Vec<Value>),
    Enveloped {
        items: Vec<Value>,
        current_page: u64,
        last_page: u64,
    },
    /// Neither shape; yielded once as-is so callers can inspect it
    Unrecognized(Value),
}

/// Counter that may arrive as a number or a numeric string
fn counter(value: Option<&Value>) -> Option<u64> {
    match value? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Normalize one listing response.
pub fn decode_page(value: Value, item_keys: &[&str], requested_page: u64) -> PageShape {
    let mut object = match value {
        Value::Array(items) => return PageShape::Bare(items),
        Value::Object(map) => map,
        other => return PageShape::Unrecognized(other),
    };
    let Some(key) = item_keys
        .iter()
        .find(|k| matches!(object.get(**k), Some(Value::Array(_))))
    else {
        return PageShape::Unrecognized(Value::Object(object));
    };
    let items = match object.remove(*key) {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    };
    let current_page = counter(object.get("current_page"))
        .or_else(|| counter(object.get("page")))
        .unwrap_or(requested_page);
    let last_page = counter(object.get("last_page"))
        .or_else(|| counter(object.get("total_pages")))
        .unwrap_or(current_page);
    PageShape::Enveloped {
        items,
        current_page,
        last_page,
    }
}

/// Lazy item iterator over a paginated endpoint.
///
/// Each page fetch goes through [`AuthClient::call`], so it waits on the
/// metadata limiter and inherits the retry policy. An error is yielded once
/// and ends the iteration.
pub struct Pages<'a, T: Transport> {
    client: &'a mut AuthClient<T>,
    call: Call,
    item_keys: &'a [&'a str],
    next_page: u64,
    buffer: VecDeque<Value>,
    done: bool,
}

impl<'a, T: Transport> Pages<'a, T> {
    pub fn new(client: &'a mut AuthClient<T>, call: Call, per_page: u32) -> Self {
        let mut call = call;
        call.set_query("per_page", per_page);
        Self {
            client,
            call,
            item_keys: DEFAULT_ITEM_KEYS,
            next_page: 1,
            buffer: VecDeque::new(),
            done: false,
        }
    }

    pub fn item_keys(mut self, keys: &'a [&'a str]) -> Self {
        self.item_keys = keys;
        self
    }

    fn fetch(&mut self) -> Result<(), CallError> {
        let page = self.next_page;
        self.call.set_query("page", page);
        let body = self.client.get_json(&self.call)?;
        match decode_page(body, self.item_keys, page) {
            PageShape::Bare(items) => {
                self.buffer.extend(items);
                self.done = true;
            }
            PageShape::Enveloped {
                items,
                current_page,
                last_page,
            } => {
                log::debug!("{} page {current_page}/{last_page}", self.call.path);
                let empty = items.is_empty();
                self.buffer.extend(items);
                // the local counter drives progress; echoed counters may be stale
                if page >= last_page || current_page >= last_page || empty {
                    self.done = true;
                } else {
                    self.next_page = page + 1;
                }
            }
            PageShape::Unrecognized(raw) => {
                log::warn!("{}: unrecognized listing shape", self.call.path);
                self.buffer.push_back(raw);
                self.done = true;
            }
        }
        Ok(())
    }
}

impl<T: Transport> Iterator for Pages<'_, T> {
    type Item = Result<Value, CallError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.buffer.pop_front() {
                return Some(Ok(item));
            }
            if self.done {
                return None;
            }
            if let Err(e) = self.fetch() {
                self.done = true;
                return Some(Err(e));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::AuthScheme;
    use crate::testing::ScriptedTransport;
    use serde_json::json;

    #[test]
    fn bare_array() {
        let shape = decode_page(json!([1, 2]), DEFAULT_ITEM_KEYS, 1);
        assert_eq!(shape, PageShape::Bare(vec![json!(1), json!(2)]));
    }

    #[test]
    fn envelope_with_string_counters() {
        let shape = decode_page(
            json!({"result": [{"id": 1}], "current_page": "2", "last_page": "3"}),
            DEFAULT_ITEM_KEYS,
            2,
        );
        assert_eq!(
            shape,
            PageShape::Enveloped {
                items: vec![json!({"id": 1})],
                current_page: 2,
                last_page: 3
            }
        );
    }

    #[test]
    fn envelope_without_counters_is_last_page() {
        let shape = decode_page(json!({"files": []}), DEFAULT_ITEM_KEYS, 4);
        assert_eq!(
            shape,
            PageShape::Enveloped {
                items: vec![],
                current_page: 4,
                last_page: 4
            }
        );
    }

    #[test]
    fn unknown_object() {
        let raw = json!({"message": "nope"});
        assert_eq!(
            decode_page(raw.clone(), DEFAULT_ITEM_KEYS, 1),
            PageShape::Unrecognized(raw)
        );
    }

    #[test]
    fn first_matching_key_wins() {
        let shape = decode_page(json!({"data": [1], "result": [2]}), &["result", "data"], 1);
        assert!(matches!(shape, PageShape::Enveloped { ref items, .. } if items == &vec![json!(2)]));
    }

    #[test]
    fn walks_three_pages() {
        let t = ScriptedTransport::new();
        t.respond_json(200, json!({"result": [1, 2], "current_page": 1, "last_page": 3}))
            .respond_json(200, json!({"result": [3, 4], "current_page": 2, "last_page": 3}))
            .respond_json(200, json!({"result": [5], "current_page": 3, "last_page": 3}));
        let mut client = AuthClient::new(t, "https://agg.test", AuthScheme::Anonymous);

        let items: Vec<Value> = Pages::new(&mut client, Call::get("/api/v6/users"), 2)
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(items, vec![json!(1), json!(2), json!(3), json!(4), json!(5)]);

        let reqs = client.transport().requests();
        assert_eq!(reqs.len(), 3);
        assert_eq!(reqs[2].query_param("page"), Some("3"));
        assert_eq!(reqs[0].query_param("per_page"), Some("2"));
    }

    #[test]
    fn stale_current_page_still_advances() {
        let t = ScriptedTransport::new();
        for _ in 0..5 {
            t.respond_json(200, json!({"result": [1], "current_page": 1, "last_page": 3}));
        }
        let mut client = AuthClient::new(t, "https://agg.test", AuthScheme::Anonymous);

        let items: Vec<Value> = Pages::new(&mut client, Call::get("/api/v6/users"), 1)
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(items.len(), 3);

        let pages: Vec<_> = client
            .transport()
            .requests()
            .iter()
            .map(|r| r.query_param("page").map(str::to_string))
            .collect();
        assert_eq!(
            pages,
            vec![Some("1".into()), Some("2".into()), Some("3".into())]
        );
        assert_eq!(client.transport().remaining(), 2);
    }

    #[test]
    fn error_is_yielded_once() {
        let t = ScriptedTransport::new();
        t.respond(403, "");
        let mut client = AuthClient::new(t, "https://agg.test", AuthScheme::Anonymous);
        let mut pages = Pages::new(&mut client, Call::get("/api/v6/users"), 100);
        assert!(matches!(pages.next(), Some(Err(CallError::Forbidden))));
        assert!(pages.next().is_none());
    }

    #[test]
    fn unrecognized_yielded_once() {
        let t = ScriptedTransport::new();
        t.respond_json(200, json!({"message": "odd"}));
        let mut client = AuthClient::new(t, "https://agg.test", AuthScheme::Anonymous);
        let items: Vec<_> = Pages::new(&mut client, Call::get("/x"), 100).collect();
        assert_eq!(items.len(), 1);
    }
}
