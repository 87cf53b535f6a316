use std::{hash::Hash, io};

use serde::{
    Serialize, Serializer,
    ser::{Error as _, SerializeMap},
};
use serde_json::{ser::Formatter, value::RawValue};
use tracing::trace;

use crate::{EncodingError, SortMap, finite::Finite};

/// Compact JSON formatter that can escape characters which are significant
/// in HTML and XML.
///
/// With escaping on, `<`, `>` and `&` become `\u003c`, `\u003e` and
/// `\u0026`, and the line and paragraph separators U+2028 and U+2029 are
/// escaped as well. Quotes, backslashes and control characters are escaped
/// by serde_json regardless.
#[derive(Clone, Copy, Debug)]
pub struct MarkupFormatter {
    escape_html: bool,
}

impl MarkupFormatter {
    pub fn new(escape_html: bool) -> Self {
        Self { escape_html }
    }
}

impl Default for MarkupFormatter {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Formatter for MarkupFormatter {
    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if !self.escape_html {
            return writer.write_all(fragment.as_bytes());
        }

        let mut start = 0;
        for (index, ch) in fragment.char_indices() {
            let escaped = match ch {
                '<' => "\\u003c",
                '>' => "\\u003e",
                '&' => "\\u0026",
                '\u{2028}' => "\\u2028",
                '\u{2029}' => "\\u2029",
                _ => continue,
            };

            writer.write_all(fragment[start..index].as_bytes())?;
            writer.write_all(escaped.as_bytes())?;
            start = index + ch.len_utf8();
        }

        writer.write_all(fragment[start..].as_bytes())
    }
}

impl<K, V> Serialize for SortMap<K, V>
where
    K: Serialize + Eq + Hash + Clone,
    V: Serialize,
{
    /// A map with escaping on is encoded on its own and handed over as raw
    /// JSON, so it stays escaped inside a document that is not. Serializers
    /// other than serde_json see serde_json's raw value token for such maps.
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if self.escape_html() {
            let json = self.to_json_string().map_err(S::Error::custom)?;
            let raw = RawValue::from_string(json).map_err(S::Error::custom)?;
            return raw.serialize(serializer);
        }

        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (key, value) in self {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<K, V> SortMap<K, V>
where
    K: Serialize + Eq + Hash + Clone,
    V: Serialize,
{
    /// Encodes the map as a compact JSON object with entries in key order.
    ///
    /// Keys follow JSON object key rules: strings are written as-is, integers
    /// and booleans are quoted, and other key types fail. NaN and infinite
    /// floats anywhere in a value fail rather than turning into `null`. The
    /// document is built in memory, so a failure never leaves partial output
    /// behind.
    pub fn to_json(&self) -> Result<Vec<u8>, EncodingError> {
        let mut buf: Vec<u8> = Vec::with_capacity(128);
        let mut serializer =
            serde_json::Serializer::with_formatter(&mut buf, MarkupFormatter::new(self.escape_html()));

        // Opening and closing the object can only fail in the writer.
        let mut map = (&mut serializer)
            .serialize_map(Some(self.len()))
            .map_err(io::Error::from)?;

        for (position, (key, value)) in self.iter().enumerate() {
            map.serialize_key(key)
                .map_err(|source| EncodingError::Key { position, source })?;
            map.serialize_value(&Finite(value))
                .map_err(|source| EncodingError::Value { position, source })?;
        }

        SerializeMap::end(map).map_err(io::Error::from)?;

        trace!(entries = self.len(), bytes = buf.len(), "encoded map");
        Ok(buf)
    }

    /// Like [`SortMap::to_json`], returning a `String`.
    pub fn to_json_string(&self) -> Result<String, EncodingError> {
        let bytes = self.to_json()?;
        String::from_utf8(bytes)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err).into())
    }

    /// Encodes the whole map, then writes it to `writer` in one go.
    pub fn write_json<W: io::Write>(&self, mut writer: W) -> Result<(), EncodingError> {
        let bytes = self.to_json()?;
        writer.write_all(&bytes)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Value;

    fn concrete_map() -> SortMap<String, Value> {
        let mut map = SortMap::new();
        map.insert("number".to_string(), 3.into());
        map.insert("string".to_string(), "x".into());
        map.insert("strings".to_string(), vec!["t", "u"].into());
        map.insert("number".to_string(), 4.into());
        map
    }

    #[test]
    fn test_concrete_scenario() -> anyhow::Result<()> {
        let map = concrete_map();

        assert_eq!(map.keys(), ["number", "string", "strings"]);
        assert_eq!(map.get("number").and_then(Value::as_i64), Some(4));
        assert_eq!(
            map.to_json_string()?,
            r#"{"number":4,"string":"x","strings":["t","u"]}"#
        );
        Ok(())
    }

    #[test]
    fn test_empty_map() -> anyhow::Result<()> {
        let map: SortMap<String, Value> = SortMap::new();
        assert_eq!(map.to_json()?, b"{}");
        Ok(())
    }

    #[test]
    fn test_encoding_is_deterministic() -> anyhow::Result<()> {
        let map = concrete_map();
        assert_eq!(map.to_json()?, map.to_json()?);
        Ok(())
    }

    #[test]
    fn test_follows_sorted_order() -> anyhow::Result<()> {
        let mut map = concrete_map();
        map.sort_by(|a, b| b.key().cmp(a.key()));

        assert_eq!(
            map.to_json_string()?,
            r#"{"strings":["t","u"],"string":"x","number":4}"#
        );
        Ok(())
    }

    #[test]
    fn test_integer_keys_are_quoted() -> anyhow::Result<()> {
        let mut map = SortMap::new();
        map.insert(2, "a");
        map.insert(1, "b");

        assert_eq!(map.to_json_string()?, r#"{"2":"a","1":"b"}"#);
        Ok(())
    }

    #[test]
    fn test_escaping_toggle() -> anyhow::Result<()> {
        let mut map = SortMap::new();
        map.insert("<k>", "a<b>&c\u{2028}");

        assert_eq!(
            map.to_json_string()?,
            r#"{"\u003ck\u003e":"a\u003cb\u003e\u0026c\u2028"}"#
        );

        map.set_escape_html(false);
        assert_eq!(map.to_json_string()?, "{\"<k>\":\"a<b>&c\u{2028}\"}");
        Ok(())
    }

    #[test]
    fn test_json_escapes_apply_without_markup_escaping() -> anyhow::Result<()> {
        let mut map = SortMap::new();
        map.set_escape_html(false);
        map.insert("q", "say \"hi\"\n\\");

        assert_eq!(map.to_json_string()?, r#"{"q":"say \"hi\"\n\\"}"#);
        Ok(())
    }

    #[test]
    fn test_nested_maps_keep_order_and_escaping() -> anyhow::Result<()> {
        let mut inner = SortMap::new();
        inner.insert("z".to_string(), Value::from("<"));
        inner.insert("a".to_string(), Value::Null);
        inner.set_escape_html(false);

        let mut outer = SortMap::new();
        outer.insert("inner".to_string(), Value::from(inner));
        outer.insert("flag".to_string(), Value::from(false));

        assert_eq!(
            outer.to_json_string()?,
            r#"{"inner":{"z":"\u003c","a":null},"flag":false}"#
        );
        Ok(())
    }

    #[test]
    fn test_inner_escaping_survives_unescaped_outer() -> anyhow::Result<()> {
        let mut inner = SortMap::new();
        inner.insert("z".to_string(), Value::from("<"));

        let mut outer = SortMap::new();
        outer.set_escape_html(false);
        outer.insert("raw".to_string(), Value::from("&"));
        outer.insert("inner".to_string(), Value::from(inner.clone()));

        assert_eq!(
            outer.to_json_string()?,
            r#"{"raw":"&","inner":{"z":"\u003c"}}"#
        );

        inner.set_escape_html(false);
        outer.insert("inner".to_string(), Value::from(inner));
        assert_eq!(outer.to_json_string()?, r#"{"raw":"&","inner":{"z":"<"}}"#);
        Ok(())
    }

    #[test]
    fn test_deeply_nested_maps() -> anyhow::Result<()> {
        let mut value = Value::from(SortMap::new());
        for _ in 0..64 {
            let mut map = SortMap::new();
            map.insert("n".to_string(), value);
            value = Value::from(map);
        }

        let mut outer = SortMap::new();
        outer.insert("n".to_string(), value);

        let expected = format!("{}{{}}{}", r#"{"n":"#.repeat(65), "}".repeat(65));
        assert_eq!(outer.to_json_string()?, expected);
        Ok(())
    }

    #[test]
    fn test_non_finite_generic_value_fails() {
        let mut map = SortMap::new();
        map.insert("ok", 1.0);
        map.insert("a", f64::NAN);

        let err = map.to_json_string().unwrap_err();
        assert!(matches!(err, EncodingError::Value { position: 1, .. }));

        let mut nested = SortMap::new();
        nested.insert("xs", vec![Some(1.5), Some(f64::INFINITY)]);
        assert_eq!(nested.to_json().unwrap_err().position(), Some(0));

        let mut inner = SortMap::new();
        inner.insert("x", f32::NAN);
        let mut outer = SortMap::new();
        outer.set_escape_html(false);
        outer.insert("inner", inner);
        assert!(matches!(
            outer.to_json().unwrap_err(),
            EncodingError::Value { position: 0, .. }
        ));
    }

    #[test]
    fn test_non_string_key_fails() {
        let mut map = SortMap::new();
        map.insert((1, 2), "pair");

        let err = map.to_json().unwrap_err();
        assert!(matches!(err, EncodingError::Key { position: 0, .. }));
    }

    #[test]
    fn test_unencodable_value_reports_position() {
        let mut map = SortMap::new();
        map.insert("ok", Value::from(1));
        map.insert("bad", Value::Float(f64::NAN));

        let err = map.to_json().unwrap_err();
        assert_eq!(err.position(), Some(1));
        assert!(matches!(err, EncodingError::Value { .. }));
    }

    #[test]
    fn test_write_json() -> anyhow::Result<()> {
        let mut out = Vec::new();
        concrete_map().write_json(&mut out)?;

        assert_eq!(out, br#"{"number":4,"string":"x","strings":["t","u"]}"#);
        Ok(())
    }

    #[test]
    fn test_serde_json_to_string_keeps_order() -> anyhow::Result<()> {
        let mut map = SortMap::new();
        map.insert("b", 1);
        map.insert("a", 2);

        assert_eq!(serde_json::to_string(&map)?, r#"{"b":1,"a":2}"#);
        Ok(())
    }
}

