// row.rs: turn a matched field map into an output row
//
// Everything here is derived from the captured text alone. The timestamp stays
// a string; parsing it into a calendar value is left to the consumer.
use serde::Serialize;
use std::collections::BTreeMap;

use crate::matcher::FieldMap;

/// Written by the server for a value it does not have.
pub const NIL_VALUE: &str = "-";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AccessLogRow {
    /// Every captured field; absent and `-` values are null.
    pub columns: BTreeMap<String, Option<String>>,
    pub tp_source_ip: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tp_ips: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tp_usernames: Vec<String>,
}

fn present(value: Option<&str>) -> Option<&str> {
    value.filter(|v| *v != NIL_VALUE)
}

impl AccessLogRow {
    pub fn from_fields(fields: &FieldMap) -> Self {
        let get = |name: &str| present(fields.get(name).and_then(|v| v.as_deref()));

        let columns = fields
            .iter()
            .map(|(k, v)| (k.clone(), present(v.as_deref()).map(str::to_string)))
            .collect();

        let tp_ips = ["remote_addr", "local_addr"]
            .into_iter()
            .filter_map(get)
            .map(str::to_string)
            .collect();

        Self {
            columns,
            tp_source_ip: get("remote_addr").map(str::to_string),
            tp_ips,
            tp_usernames: get("remote_user").map(str::to_string).into_iter().collect(),
        }
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.columns.get(column).and_then(|v| v.as_deref())
    }
}
