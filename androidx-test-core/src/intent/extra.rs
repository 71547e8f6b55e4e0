use std::collections::BTreeMap;

use super::Intent;

/// Extra data to include with an intent
pub enum Extra {
    Text,
    Subject,
    Email,
    PhoneNumber,
}

impl AsRef<str> for Extra {
    fn as_ref(&self) -> &str {
        match self {
            Self::Text => "android.intent.extra.TEXT",
            Self::Subject => "android.intent.extra.SUBJECT",
            Self::Email => "android.intent.extra.EMAIL",
            Self::PhoneNumber => "android.intent.extra.PHONE_NUMBER",
        }
    }
}

/// A typed value stored under an extras key.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtraValue {
    Str(String),
    Int(i64),
    Bool(bool),
    Intent(Box<Intent>),
    Bundle(Bundle),
}

pub type Bundle = BTreeMap<String, ExtraValue>;

impl From<&str> for ExtraValue {
    fn from(value: &str) -> Self {
        ExtraValue::Str(value.to_string())
    }
}

impl From<String> for ExtraValue {
    fn from(value: String) -> Self {
        ExtraValue::Str(value)
    }
}

impl From<i64> for ExtraValue {
    fn from(value: i64) -> Self {
        ExtraValue::Int(value)
    }
}

impl From<i32> for ExtraValue {
    fn from(value: i32) -> Self {
        ExtraValue::Int(value.into())
    }
}

impl From<bool> for ExtraValue {
    fn from(value: bool) -> Self {
        ExtraValue::Bool(value)
    }
}

impl From<Intent> for ExtraValue {
    fn from(value: Intent) -> Self {
        ExtraValue::Intent(Box::new(value))
    }
}

impl From<Bundle> for ExtraValue {
    fn from(value: Bundle) -> Self {
        ExtraValue::Bundle(value)
    }
}
