use serde::{Deserialize, Serialize};
use serde_json::Number;
use std::collections::BTreeMap;
use std::fmt;

/// 設定鍵值對照表。 / Ordered key → value table used for both defaults and overrides.
pub type SettingsMap = BTreeMap<String, SettingValue>;

/// 設定檔允許的純量值。 / Scalar value accepted in a `userSettings` document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Bool(bool),
    Number(Number),
    Text(String),
}

impl SettingValue {
    /// Parses a command-line literal: `true`/`false`, then numbers, otherwise text.
    /// 解析命令列字面值：先嘗試布林與數字，其餘視為文字。
    pub fn parse_literal(raw: &str) -> Self {
        match raw {
            "true" => return SettingValue::Bool(true),
            "false" => return SettingValue::Bool(false),
            _ => {}
        }
        if let Ok(int) = raw.parse::<i64>() {
            return SettingValue::Number(int.into());
        }
        if let Some(number) = raw.parse::<f64>().ok().and_then(Number::from_f64) {
            return SettingValue::Number(number);
        }
        SettingValue::Text(raw.to_string())
    }

    /// Converts a raw JSON value, rejecting null, arrays and objects.
    pub(crate) fn from_json(value: serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Bool(flag) => Some(SettingValue::Bool(flag)),
            serde_json::Value::Number(number) => Some(SettingValue::Number(number)),
            serde_json::Value::String(text) => Some(SettingValue::Text(text)),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SettingValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SettingValue::Bool(flag) => Some(*flag),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SettingValue::Number(number) => number.as_f64(),
            _ => None,
        }
    }

    /// 值的型別名稱（錯誤訊息用）。 / Type name used in mismatch errors.
    pub fn kind(&self) -> &'static str {
        match self {
            SettingValue::Bool(_) => "bool",
            SettingValue::Number(_) => "number",
            SettingValue::Text(_) => "string",
        }
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingValue::Bool(flag) => write!(f, "{flag}"),
            SettingValue::Number(number) => write!(f, "{number}"),
            SettingValue::Text(text) => f.write_str(text),
        }
    }
}

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        SettingValue::Text(value.to_string())
    }
}

impl From<String> for SettingValue {
    fn from(value: String) -> Self {
        SettingValue::Text(value)
    }
}

impl From<bool> for SettingValue {
    fn from(value: bool) -> Self {
        SettingValue::Bool(value)
    }
}

impl From<i64> for SettingValue {
    fn from(value: i64) -> Self {
        SettingValue::Number(value.into())
    }
}

impl From<f64> for SettingValue {
    fn from(value: f64) -> Self {
        Number::from_f64(value)
            .map(SettingValue::Number)
            .unwrap_or_else(|| SettingValue::Text(value.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_literal_prefers_bool_then_number() {
        assert_eq!(SettingValue::parse_literal("true"), SettingValue::Bool(true));
        assert_eq!(SettingValue::parse_literal("42"), SettingValue::from(42));
        assert_eq!(SettingValue::parse_literal("0.5").as_f64(), Some(0.5));
        assert_eq!(
            SettingValue::parse_literal("Program 1"),
            SettingValue::from("Program 1")
        );
        // NaN has no JSON representation, so it stays text.
        assert_eq!(SettingValue::parse_literal("NaN").kind(), "string");
    }

    #[test]
    fn untagged_serde_keeps_scalar_shape() {
        let encoded = serde_json::to_string(&vec![
            SettingValue::from(true),
            SettingValue::from(3),
            SettingValue::from("x"),
        ])
        .unwrap();
        assert_eq!(encoded, r#"[true,3,"x"]"#);
        let decoded: Vec<SettingValue> = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded[1].as_f64(), Some(3.0));
    }
}
