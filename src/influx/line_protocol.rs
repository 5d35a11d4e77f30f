use super::point::{FieldValue, Point};

/// Encode a point as one line of InfluxDB line protocol.
///
/// Tags with empty values and non-finite floats are skipped since the
/// backend rejects both. Returns `None` when no field survives.
pub fn encode_point(point: &Point) -> Option<String> {
    let mut fields = point
        .fields
        .iter()
        .filter_map(|(key, value)| encode_field(value).map(|v| format!("{}={}", escape_key(key), v)))
        .peekable();

    fields.peek()?;
    let fields: Vec<String> = fields.collect();

    let mut line = escape_measurement(&point.measurement);
    for (key, value) in &point.tags {
        if value.is_empty() {
            continue;
        }
        line.push(',');
        line.push_str(&escape_key(key));
        line.push('=');
        line.push_str(&escape_key(value));
    }
    line.push(' ');
    line.push_str(&fields.join(","));

    Some(line)
}

/// Encode a batch of points, one per line, dropping points with no fields
pub fn encode_points(points: &[Point]) -> String {
    points
        .iter()
        .filter_map(encode_point)
        .collect::<Vec<_>>()
        .join("\n")
}

fn encode_field(value: &FieldValue) -> Option<String> {
    match value {
        FieldValue::Integer(i) => Some(format!("{}i", i)),
        FieldValue::Float(f) if f.is_finite() => Some(format!("{}", f)),
        FieldValue::Float(_) => None,
        FieldValue::Boolean(b) => Some(b.to_string()),
        FieldValue::String(s) => Some(format!("\"{}\"", escape_string(s))),
    }
}

fn escape_measurement(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c == ',' || c == ' ' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Tag keys, tag values and field keys share the same escaping rules
fn escape_key(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c == ',' || c == '=' || c == ' ' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn escape_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
