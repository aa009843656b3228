use std::collections::BTreeMap;
use uuid::Uuid;

// ============================================================================
// W3C Trace Context carrier
// ============================================================================
//
// Holds the `traceparent`, `tracestate` and `baggage` entries received with a
// request so they can be forwarded on outbound messages. Publishing derives a
// child carrier: same trace id and flags, fresh parent span id.
//
// ============================================================================

pub const TRACEPARENT: &str = "traceparent";
pub const TRACESTATE: &str = "tracestate";
pub const BAGGAGE: &str = "baggage";

const VERSION: &str = "00";
const SAMPLED: &str = "01";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceCarrier {
    entries: BTreeMap<String, String>,
}

struct TraceParent<'a> {
    trace_id: &'a str,
    flags: &'a str,
}

fn parse_traceparent(value: &str) -> Option<TraceParent<'_>> {
    let mut parts = value.split('-');
    let (version, trace_id, span_id, flags) = (parts.next()?, parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() || version != VERSION {
        return None;
    }

    let is_hex = |s: &str, len: usize| s.len() == len && s.chars().all(|c| c.is_ascii_hexdigit());
    let all_zero = |s: &str| s.chars().all(|c| c == '0');

    if !is_hex(trace_id, 32) || !is_hex(span_id, 16) || !is_hex(flags, 2) {
        return None;
    }
    if all_zero(trace_id) || all_zero(span_id) {
        return None;
    }

    Some(TraceParent { trace_id, flags })
}

fn new_trace_id() -> String {
    Uuid::new_v4().simple().to_string()
}

fn new_span_id() -> String {
    let id = Uuid::new_v4().simple().to_string();
    id[..16].to_string()
}

impl TraceCarrier {
    /// Starts a new sampled trace
    pub fn new_root() -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(
            TRACEPARENT.to_string(),
            format!("{}-{}-{}-{}", VERSION, new_trace_id(), new_span_id(), SAMPLED),
        );
        Self { entries }
    }

    /// Extracts the trace context from request headers. A missing or
    /// malformed `traceparent` starts a new trace; baggage is kept either way.
    pub fn from_headers<'a, I>(headers: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut received = BTreeMap::new();
        for (key, value) in headers {
            let key = key.to_ascii_lowercase();
            if key == TRACEPARENT || key == TRACESTATE || key == BAGGAGE {
                received.insert(key, value.trim().to_string());
            }
        }

        let valid_parent = received
            .get(TRACEPARENT)
            .is_some_and(|value| parse_traceparent(value).is_some());

        if valid_parent {
            return Self { entries: received };
        }

        let mut carrier = Self::new_root();
        if let Some(baggage) = received.remove(BAGGAGE) {
            carrier.entries.insert(BAGGAGE.to_string(), baggage);
        }
        carrier
    }

    pub fn trace_id(&self) -> &str {
        self.entries
            .get(TRACEPARENT)
            .and_then(|value| parse_traceparent(value))
            .map_or("", |parent| parent.trace_id)
    }

    /// Carrier for a downstream hop of the same trace
    pub fn child(&self) -> Self {
        let mut entries = self.entries.clone();
        if let Some(parent) = self.entries.get(TRACEPARENT).and_then(|v| parse_traceparent(v)) {
            entries.insert(
                TRACEPARENT.to_string(),
                format!("{}-{}-{}-{}", VERSION, parent.trace_id, new_span_id(), parent.flags),
            );
        }
        Self { entries }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }
}
