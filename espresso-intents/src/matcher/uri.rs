//! Matchers over the parts of an intent's data URI.
//!
//! Intent data is parsed with [`Url`] before matching, so hosts are
//! lowercased and hierarchical URIs without a path get `/`. Opaque URIs such
//! as `mailto:dev@example.com` have no host, path or query parameters.

use percent_encoding::percent_decode_str;
use url::Url;

use super::{StringMatcher, ValueMatcher};

pub type UriMatcher = ValueMatcher<Url>;

/// Parses intent data, `None` if it isn't an absolute URI.
pub fn parse(data: &str) -> Option<Url> {
    match Url::parse(data) {
        Ok(url) => Some(url),
        Err(err) => {
            log::trace!("Not matching intent data {:?}: {}", data, err);
            None
        }
    }
}

/// Everything between `scheme:` and the fragment, decoded.
pub fn scheme_specific_part(url: &Url) -> String {
    let raw = &url.as_str()[url.scheme().len() + 1..];
    let raw = raw.split('#').next().unwrap_or_default();
    percent_decode_str(raw).decode_utf8_lossy().into_owned()
}

pub fn has_scheme(scheme: impl AsRef<str>) -> UriMatcher {
    has_scheme_matching(super::is(scheme))
}

pub fn has_scheme_matching(scheme: StringMatcher) -> UriMatcher {
    ValueMatcher::new(format!("has scheme: {}", scheme.describe()), move |url: &Url| {
        scheme.matches(url.scheme())
    })
}

pub fn has_host(host: impl AsRef<str>) -> UriMatcher {
    has_host_matching(super::is(host))
}

pub fn has_host_matching(host: StringMatcher) -> UriMatcher {
    ValueMatcher::new(format!("has host: {}", host.describe()), move |url: &Url| {
        url.host_str().map_or(false, |h| host.matches(h))
    })
}

pub fn has_path(path: impl AsRef<str>) -> UriMatcher {
    has_path_matching(super::is(path))
}

pub fn has_path_matching(path: StringMatcher) -> UriMatcher {
    ValueMatcher::new(format!("has path: {}", path.describe()), move |url: &Url| {
        !url.cannot_be_a_base() && path.matches(url.path())
    })
}

pub fn has_param_with_name(name: impl AsRef<str>) -> UriMatcher {
    has_param_with_name_matching(super::is(name))
}

/// Never matches an opaque URI.
pub fn has_param_with_name_matching(name: StringMatcher) -> UriMatcher {
    ValueMatcher::new(
        format!("has param with name: {}", name.describe()),
        move |url: &Url| {
            !url.cannot_be_a_base() && url.query_pairs().any(|(key, _)| name.matches(&key))
        },
    )
}

pub fn has_param_with_value(name: impl AsRef<str>, value: impl AsRef<str>) -> UriMatcher {
    has_param_with_value_matching(super::is(name), super::is(value))
}

/// Matches if any value given for a matching parameter name matches, so
/// repeated parameters are all considered.
pub fn has_param_with_value_matching(name: StringMatcher, value: StringMatcher) -> UriMatcher {
    ValueMatcher::new(
        format!(
            "has param with: name: {} value: {}",
            name.describe(),
            value.describe()
        ),
        move |url: &Url| {
            !url.cannot_be_a_base()
                && url
                    .query_pairs()
                    .any(|(key, val)| name.matches(&key) && value.matches(&val))
        },
    )
}

pub fn has_scheme_specific_part(
    scheme: impl AsRef<str>,
    scheme_specific_part: impl AsRef<str>,
) -> UriMatcher {
    has_scheme_specific_part_matching(super::is(scheme), super::is(scheme_specific_part))
}

pub fn has_scheme_specific_part_matching(
    scheme: StringMatcher,
    scheme_specific_part: StringMatcher,
) -> UriMatcher {
    ValueMatcher::new(
        format!(
            "has scheme specific part: scheme: {} scheme specific part: {}",
            scheme.describe(),
            scheme_specific_part.describe()
        ),
        move |url: &Url| {
            scheme.matches(url.scheme())
                && scheme_specific_part.matches(&self::scheme_specific_part(url))
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::starts_with;

    fn url(s: &str) -> Url {
        parse(s).unwrap()
    }

    #[test]
    fn hierarchical_uri_parts() {
        let search = url("https://Example.com/search?q=rust&q=cargo&lang=en#top");

        assert!(has_scheme("https").matches(&search));
        assert!(!has_scheme("http").matches(&search));
        assert!(has_host("example.com").matches(&search));
        assert!(has_path("/search").matches(&search));
        assert!(has_path_matching(starts_with("/sea")).matches(&search));
        assert!(has_param_with_name("lang").matches(&search));
        assert!(!has_param_with_name("page").matches(&search));
        assert!(has_param_with_value("q", "rust").matches(&search));
        assert!(has_param_with_value("q", "cargo").matches(&search));
        assert!(!has_param_with_value("lang", "rust").matches(&search));
        assert!(has_scheme_specific_part("https", "//example.com/search?q=rust&q=cargo&lang=en")
            .matches(&search));
    }

    #[test]
    fn opaque_uri_parts() {
        let mail = url("mailto:dev%40example.com?subject=hi");

        assert!(has_scheme("mailto").matches(&mail));
        assert!(has_scheme_specific_part("mailto", "dev@example.com?subject=hi").matches(&mail));
        assert!(!has_host("example.com").matches(&mail));
        assert!(!has_path("dev%40example.com").matches(&mail));
        assert!(!has_param_with_name("subject").matches(&mail));
    }

    #[test]
    fn descriptions() {
        assert_eq!(has_host("a.b").describe(), "has host: is \"a.b\"");
        assert_eq!(
            has_param_with_value("q", "x").describe(),
            "has param with: name: is \"q\" value: is \"x\""
        );
        assert!(parse("not a uri").is_none());
    }
}
