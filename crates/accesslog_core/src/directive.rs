// directive.rs: the static directive table (token -> named capture fragment)
use once_cell::sync::Lazy;
use std::borrow::Cow;
use std::collections::{HashMap, HashSet};

/// Matching rule for one directive token.
///
/// `pattern` only ever contains named groups (or non-capturing ones), so
/// substituting it into a layout never shifts the position of other fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fragment {
    pub fields: &'static [&'static str],
    pub pattern: &'static str,
}

impl Fragment {
    /// Render the fragment for insertion into a pattern, demoting any field that
    /// is already captured earlier in the same pattern to a non-capturing group.
    pub fn render(&self, seen: &mut HashSet<&'static str>) -> Cow<'static, str> {
        let mut out = Cow::Borrowed(self.pattern);
        for &field in self.fields {
            if !seen.insert(field) {
                let named = format!("(?P<{}>", field);
                out = Cow::Owned(out.replace(&named, "(?:"));
            }
        }
        out
    }
}

// token, fields, pattern
const DIRECTIVE_TABLE: &[(&str, &[&str], &str)] = &[
    ("%%", &[], "%"),
    ("%a", &["remote_addr"], r"(?P<remote_addr>[^ ]*)"),
    ("%{c}a", &["remote_addr"], r"(?P<remote_addr>[^ ]*)"), // underlying connection
    ("%A", &["local_addr"], r"(?P<local_addr>[^ ]*)"),
    ("%b", &["body_bytes_sent"], r"(?P<body_bytes_sent>[^ ]*)"), // '-' when no bytes sent
    ("%B", &["body_bytes_sent"], r"(?P<body_bytes_sent>[^ ]*)"), // '0' when no bytes sent
    ("%D", &["request_time_us"], r"(?P<request_time_us>[^ ]*)"),
    ("%f", &["filename"], r"(?P<filename>[^ ]*)"),
    ("%h", &["remote_addr"], r"(?P<remote_addr>[^ ]*)"),
    ("%{c}h", &["remote_addr"], r"(?P<remote_addr>[^ ]*)"),
    ("%H", &["server_protocol"], r"(?P<server_protocol>[^ ]*)"),
    ("%k", &["keepalive_requests"], r"(?P<keepalive_requests>[^ ]*)"),
    ("%l", &["remote_logname"], r"(?P<remote_logname>[^ ]*)"), // identd, almost always '-'
    ("%m", &["request_method"], r"(?P<request_method>[^ ]*)"),
    ("%p", &["server_port"], r"(?P<server_port>[^ ]*)"),
    ("%{canonical}p", &["server_port"], r"(?P<server_port>[^ ]*)"),
    ("%{local}p", &["apache_port"], r"(?P<apache_port>[^ ]*)"),
    ("%{remote}p", &["client_port"], r"(?P<client_port>[^ ]*)"),
    ("%P", &["pid"], r"(?P<pid>[^ ]*)"),
    ("%{pid}P", &["pid"], r"(?P<pid>[^ ]*)"),
    ("%{tid}P", &["thread_id"], r"(?P<thread_id>[^ ]*)"),
    ("%{hextid}P", &["hex_thread_id"], r"(?P<hex_thread_id>[^ ]*)"),
    ("%q", &["query_string"], r"(?P<query_string>[^ ]*)"),
    (
        "%r",
        &["request_method", "request_uri", "server_protocol"],
        r"(?P<request_method>\S+)(?: +(?P<request_uri>[^ ]+))?(?: +(?P<server_protocol>\S+))?",
    ),
    ("%R", &["handler"], r"(?P<handler>[^ ]*)"),
    ("%s", &["status"], r"(?P<status>[^ ]*)"),
    ("%<s", &["status"], r"(?P<status>[^ ]*)"),
    ("%>s", &["status"], r"(?P<status>[^ ]*)"), // final status
    ("%t", &["timestamp"], r"\[(?P<timestamp>[^\]]*)\]"),
    ("%T", &["request_time"], r"(?P<request_time>[^ ]*)"),
    ("%{s}T", &["request_time"], r"(?P<request_time>[^ ]*)"),
    ("%{ms}T", &["request_time_ms"], r"(?P<request_time_ms>[^ ]*)"),
    ("%{us}T", &["request_time_us"], r"(?P<request_time_us>[^ ]*)"),
    ("%u", &["remote_user"], r"(?P<remote_user>[^ ]*)"),
    ("%<u", &["remote_user"], r"(?P<remote_user>[^ ]*)"),
    ("%>u", &["remote_user"], r"(?P<remote_user>[^ ]*)"),
    ("%U", &["request_uri"], r"(?P<request_uri>[^ ]*)"),
    ("%v", &["server_name"], r"(?P<server_name>[^ ]*)"),
    ("%V", &["server_name"], r"(?P<server_name>[^ ]*)"),
    // x = aborted, + = may be kept alive, - = will be closed
    ("%X", &["connection_status"], r"(?P<connection_status>[^ ]*)"),
    ("%I", &["bytes_received"], r"(?P<bytes_received>[^ ]*)"),
    ("%O", &["bytes_sent"], r"(?P<bytes_sent>[^ ]*)"),
    ("%S", &["bytes_transferred"], r"(?P<bytes_transferred>[^ ]*)"),
    ("%{Referer}i", &["http_referer"], r#"(?P<http_referer>[^"]*)"#),
    ("%{User-agent}i", &["http_user_agent"], r#"(?P<http_user_agent>[^"]*)"#),
    ("%{User-Agent}i", &["http_user_agent"], r#"(?P<http_user_agent>[^"]*)"#),
];

static DIRECTIVES: Lazy<HashMap<&'static str, Fragment>> = Lazy::new(|| {
    DIRECTIVE_TABLE
        .iter()
        .map(|&(token, fields, pattern)| (token, Fragment { fields, pattern }))
        .collect()
});

/// Look up a directive token such as `%h`, `%>s` or `%{Referer}i`.
pub fn lookup(token: &str) -> Option<&'static Fragment> {
    DIRECTIVES.get(token)
}

/// Every supported token, in table order.
#[cfg(test)]
pub(crate) fn tokens() -> impl Iterator<Item = &'static str> {
    DIRECTIVE_TABLE.iter().map(|&(token, _, _)| token)
}
