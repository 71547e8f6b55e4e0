//! Matchers over an extras [`Bundle`], for use with
//! [`has_extras`](super::has_extras).

use androidx_test_core::intent::{Bundle, ExtraValue};

use super::{StringMatcher, ValueMatcher};

pub type BundleMatcher = ValueMatcher<Bundle>;
pub type ExtraMatcher = ValueMatcher<ExtraValue>;

/// Matches an extra equal to `value`.
pub fn equal_to(value: impl Into<ExtraValue>) -> ExtraMatcher {
    let value = value.into();
    ValueMatcher::new(format!("is {:?}", value), move |v: &ExtraValue| *v == value)
}

pub fn anything() -> ExtraMatcher {
    ValueMatcher::new("ANYTHING", |_: &ExtraValue| true)
}

pub fn is_empty() -> BundleMatcher {
    ValueMatcher::new("is empty bundle", |bundle: &Bundle| bundle.is_empty())
}

pub fn has_entry(key: impl AsRef<str>, value: impl Into<ExtraValue>) -> BundleMatcher {
    has_entry_matching(super::is(key), equal_to(value))
}

pub fn has_entry_matching(key: StringMatcher, value: ExtraMatcher) -> BundleMatcher {
    entry(key, value, true)
}

pub fn has_key(key: impl AsRef<str>) -> BundleMatcher {
    has_key_matching(super::is(key))
}

pub fn has_key_matching(key: StringMatcher) -> BundleMatcher {
    entry(key, anything(), true)
}

pub fn does_not_have_key(key: impl AsRef<str>) -> BundleMatcher {
    does_not_have_key_matching(super::is(key))
}

pub fn does_not_have_key_matching(key: StringMatcher) -> BundleMatcher {
    entry(key, anything(), false)
}

/// Matches if some key holds `value`.
pub fn has_value(value: impl Into<ExtraValue>) -> BundleMatcher {
    has_value_matching(equal_to(value))
}

pub fn has_value_matching(value: ExtraMatcher) -> BundleMatcher {
    entry(super::any_string(), value, true)
}

fn entry(key: StringMatcher, value: ExtraMatcher, should_be_present: bool) -> BundleMatcher {
    let description = format!(
        "has bundle {}: key: {} value: {}",
        if should_be_present { "with" } else { "without" },
        key.describe(),
        value.describe()
    );
    ValueMatcher::new(description, move |bundle: &Bundle| {
        let found = bundle
            .iter()
            .any(|(k, v)| key.matches(k) && value.matches(v));
        found == should_be_present
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::starts_with;

    fn bundle() -> Bundle {
        let mut bundle = Bundle::new();
        bundle.insert("id".to_string(), 7.into());
        bundle.insert("name".to_string(), "photo".into());
        bundle.insert("name_short".to_string(), "ph".into());
        bundle
    }

    #[test]
    fn entries_and_keys() {
        let bundle = bundle();

        assert!(has_entry("id", 7).matches(&bundle));
        assert!(!has_entry("id", "7").matches(&bundle));
        assert!(has_entry_matching(starts_with("name"), equal_to("ph")).matches(&bundle));
        assert!(has_key("name").matches(&bundle));
        assert!(!has_key("missing").matches(&bundle));
        assert!(does_not_have_key("missing").matches(&bundle));
        assert!(!does_not_have_key_matching(starts_with("na")).matches(&bundle));
        assert!(has_value("photo").matches(&bundle));
        assert!(!has_value(8).matches(&bundle));
    }

    #[test]
    fn empty_bundles() {
        assert!(is_empty().matches(&Bundle::new()));
        assert!(!is_empty().matches(&bundle()));
        assert!(does_not_have_key("id").matches(&Bundle::new()));
        assert!(!has_value_matching(anything()).matches(&Bundle::new()));
    }

    #[test]
    fn descriptions() {
        assert_eq!(
            does_not_have_key("id").describe(),
            "has bundle without: key: is \"id\" value: ANYTHING"
        );
        assert_eq!(equal_to(true).describe(), "is Bool(true)");
    }
}
