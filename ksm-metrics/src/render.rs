use bytes::Bytes;

use crate::family::{Family, Sample};

/// Renders one family's samples for one object into the family's pre-encoded byte
/// slice: `name{k1="v1",...} value\n` per line, with `base_labels` (namespace, the
/// kind's name label) prepended ahead of the family's own declared labels (spec 3,
/// 4.D). An empty slice means the object contributes nothing to this family.
pub fn render_family<T>(family: &Family<T>, obj: &T, base_labels: &[(String, String)]) -> Bytes {
    let samples = family.generate(obj);
    if samples.is_empty() {
        return Bytes::new();
    }

    let mut buf = Vec::new();
    for sample in samples {
        write_line(&mut buf, &family.name, base_labels, &family.label_keys, &sample);
    }
    Bytes::from(buf)
}

fn write_line(buf: &mut Vec<u8>, name: &str, base_labels: &[(String, String)], label_keys: &[String], sample: &Sample) {
    buf.extend_from_slice(name.as_bytes());
    buf.extend_from_slice(sample.name_suffix.as_bytes());
    buf.push(b'{');

    let mut first = true;
    for (k, v) in base_labels {
        write_label(buf, k, v, &mut first);
    }
    for (k, v) in label_keys.iter().zip(&sample.label_values) {
        write_label(buf, k, v, &mut first);
    }
    for (k, v) in &sample.dynamic_labels {
        write_label(buf, k, v, &mut first);
    }

    buf.push(b'}');
    buf.push(b' ');
    buf.extend_from_slice(format_float(sample.value).as_bytes());
    buf.push(b'\n');
}

fn write_label(buf: &mut Vec<u8>, key: &str, value: &str, first: &mut bool) {
    if !*first {
        buf.push(b',');
    }
    *first = false;
    buf.extend_from_slice(key.as_bytes());
    buf.extend_from_slice(b"=\"");
    escape_into(buf, value);
    buf.push(b'"');
}

/// Escapes backslashes, double quotes, and newlines per the exposition format.
fn escape_into(buf: &mut Vec<u8>, value: &str) {
    let mut tmp = [0u8; 4];
    for c in value.chars() {
        match c {
            '\\' => buf.extend_from_slice(b"\\\\"),
            '"' => buf.extend_from_slice(b"\\\""),
            '\n' => buf.extend_from_slice(b"\\n"),
            _ => buf.extend_from_slice(c.encode_utf8(&mut tmp).as_bytes()),
        }
    }
}

fn format_float(v: f64) -> String {
    if v.is_finite() && v == v.trunc() && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{v}")
    }
}
