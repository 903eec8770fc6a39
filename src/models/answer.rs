//! 候选答案及其类型转换

use std::fmt::Display;

use serde::Serialize;
use serde_json::Value as JsonValue;

/// 答案的类型化取值
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TypedValue {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    /// JSON 对象或数组
    Structured(JsonValue),
    Text(String),
}

const AFFIRMATIVE: &[&str] = &["true", "yes"];
const NEGATIVE: &[&str] = &["false", "no"];

impl TypedValue {
    /// 对求解器的原始回答做尽力而为的类型转换
    ///
    /// 优先级固定：结构化 JSON → 布尔字面量 → 数字（有小数点为浮点）→ 原样字符串。
    pub fn coerce(raw: &str) -> Self {
        let trimmed = raw.trim();

        if trimmed.starts_with('{') || trimmed.starts_with('[') {
            if let Ok(value) = serde_json::from_str::<JsonValue>(trimmed) {
                return TypedValue::Structured(value);
            }
        }

        let lowered = trimmed.to_ascii_lowercase();
        if AFFIRMATIVE.contains(&lowered.as_str()) {
            return TypedValue::Boolean(true);
        }
        if NEGATIVE.contains(&lowered.as_str()) {
            return TypedValue::Boolean(false);
        }

        if trimmed.contains('.') {
            if let Ok(value) = trimmed.parse::<f64>() {
                if value.is_finite() {
                    return TypedValue::Float(value);
                }
            }
        } else if let Ok(value) = trimmed.parse::<i64>() {
            return TypedValue::Integer(value);
        }

        TypedValue::Text(trimmed.to_string())
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            TypedValue::Integer(v) => JsonValue::from(*v),
            TypedValue::Float(v) => JsonValue::from(*v),
            TypedValue::Boolean(v) => JsonValue::Bool(*v),
            TypedValue::Structured(v) => v.clone(),
            TypedValue::Text(v) => JsonValue::String(v.clone()),
        }
    }
}

impl Display for TypedValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypedValue::Integer(v) => write!(f, "{}", v),
            TypedValue::Float(v) => write!(f, "{}", v),
            TypedValue::Boolean(v) => write!(f, "{}", v),
            TypedValue::Structured(v) => write!(f, "{}", v),
            TypedValue::Text(v) => write!(f, "{}", v),
        }
    }
}

/// 答案置信度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    /// 来自求解器
    Solved,
    /// 求解失败后的占位答案
    Sentinel,
}

/// 合成出的候选答案
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SynthesizedAnswer {
    pub raw_response: String,
    pub typed_value: TypedValue,
    pub confidence: Confidence,
}

impl SynthesizedAnswer {
    /// 占位答案：不做类型转换，原样提交
    pub fn sentinel(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            typed_value: TypedValue::Text(text.clone()),
            raw_response: text,
            confidence: Confidence::Sentinel,
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.confidence == Confidence::Sentinel
    }
}
