use std::collections::BTreeSet;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use androidx_test_core::intent::{ExtraValue, IntentFlags};
use androidx_test_core::platform::{PackageManager, ResolveInfo};
use androidx_test_core::{ComponentName, Instrumentation, Intent};

pub mod bundle;
pub use bundle::BundleMatcher;

pub mod uri;
pub use uri::UriMatcher;

/// An intent together with the activities it resolved to at the time it was
/// sent.
///
/// Derefs to the [`Intent`] so matchers can inspect it directly.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedIntent {
    intent: Intent,
    resolve_infos: Vec<ResolveInfo>,
}

impl ResolvedIntent {
    pub fn new(intent: Intent, resolve_infos: Vec<ResolveInfo>) -> Self {
        Self {
            intent,
            resolve_infos,
        }
    }

    pub fn resolve(intent: &Intent, package_manager: &PackageManager) -> Self {
        Self::new(
            intent.clone(),
            package_manager.query_intent_activities(intent),
        )
    }

    pub fn intent(&self) -> &Intent {
        &self.intent
    }

    pub fn resolve_infos(&self) -> &[ResolveInfo] {
        &self.resolve_infos
    }

    /// Whether some activity in `package` can handle the intent.
    pub fn can_be_handled_by(&self, package: &str) -> bool {
        self.resolve_infos.iter().any(|info| info.package() == package)
    }
}

impl Deref for ResolvedIntent {
    type Target = Intent;

    fn deref(&self) -> &Self::Target {
        &self.intent
    }
}

impl fmt::Display for ResolvedIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.intent)?;
        if !self.resolve_infos.is_empty() {
            let components: Vec<String> = self
                .resolve_infos
                .iter()
                .map(|info| info.component().to_string())
                .collect();
            write!(f, " -> [{}]", components.join(", "))?;
        }
        Ok(())
    }
}

/// Decides whether a sent intent is the one a stub or a verification is
/// about.
pub trait IntentMatcher: Send + Sync {
    fn matches(&self, intent: &ResolvedIntent) -> bool;

    /// A short description used in verification failures.
    fn describe(&self) -> String;
}

pub type Matcher = Arc<dyn IntentMatcher>;

struct PredicateMatcher<F> {
    description: String,
    predicate: F,
}

impl<F> IntentMatcher for PredicateMatcher<F>
where
    F: Fn(&ResolvedIntent) -> bool + Send + Sync,
{
    fn matches(&self, intent: &ResolvedIntent) -> bool {
        (self.predicate)(intent)
    }

    fn describe(&self) -> String {
        self.description.clone()
    }
}

fn matcher<F>(description: String, predicate: F) -> Matcher
where
    F: Fn(&ResolvedIntent) -> bool + Send + Sync + 'static,
{
    Arc::new(PredicateMatcher {
        description,
        predicate,
    })
}

/// A described predicate over some part of an intent, such as its action
/// string, its data URI or its extras.
pub struct ValueMatcher<T: ?Sized> {
    description: String,
    predicate: Arc<dyn Fn(&T) -> bool + Send + Sync>,
}

impl<T: ?Sized> ValueMatcher<T> {
    pub fn new<F>(description: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Self {
            description: description.into(),
            predicate: Arc::new(predicate),
        }
    }

    pub fn matches(&self, value: &T) -> bool {
        (self.predicate)(value)
    }

    pub fn describe(&self) -> &str {
        &self.description
    }
}

impl<T: ?Sized> Clone for ValueMatcher<T> {
    fn clone(&self) -> Self {
        Self {
            description: self.description.clone(),
            predicate: self.predicate.clone(),
        }
    }
}

impl<T: ?Sized> fmt::Debug for ValueMatcher<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ValueMatcher")
            .field(&self.description)
            .finish()
    }
}

pub type StringMatcher = ValueMatcher<str>;

pub fn is(expected: impl AsRef<str>) -> StringMatcher {
    let expected = expected.as_ref().to_string();
    ValueMatcher::new(format!("is \"{}\"", expected), move |s: &str| s == expected)
}

pub fn starts_with(prefix: impl AsRef<str>) -> StringMatcher {
    let prefix = prefix.as_ref().to_string();
    ValueMatcher::new(
        format!("a string starting with \"{}\"", prefix),
        move |s: &str| s.starts_with(prefix.as_str()),
    )
}

pub fn contains_string(part: impl AsRef<str>) -> StringMatcher {
    let part = part.as_ref().to_string();
    ValueMatcher::new(
        format!("a string containing \"{}\"", part),
        move |s: &str| s.contains(part.as_str()),
    )
}

pub fn any_string() -> StringMatcher {
    ValueMatcher::new("ANYTHING", |_: &str| true)
}

pub fn any_intent() -> Matcher {
    matcher("any intent".to_string(), |_| true)
}

pub fn has_action(action: impl AsRef<str>) -> Matcher {
    let action = action.as_ref().to_string();
    matcher(format!("has action: \"{}\"", action), move |intent| {
        intent.action() == Some(action.as_str())
    })
}

pub fn has_action_matching(action: StringMatcher) -> Matcher {
    matcher(format!("has action: {}", action.describe()), move |intent| {
        intent.action().map_or(false, |a| action.matches(a))
    })
}

/// Matches if the intent has exactly these categories.
pub fn has_categories<I, S>(categories: I) -> Matcher
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let categories: BTreeSet<String> = categories
        .into_iter()
        .map(|c| c.as_ref().to_string())
        .collect();
    matcher(format!("has categories: {:?}", categories), move |intent| {
        intent.categories() == &categories
    })
}

pub fn has_component(component: ComponentName) -> Matcher {
    matcher(format!("has component: {}", component), move |intent| {
        intent.component() == Some(&component)
    })
}

/// Matches the fully qualified class name of the target component,
/// whatever its package.
pub fn has_component_class(class_name: impl AsRef<str>) -> Matcher {
    let class_name = class_name.as_ref().to_string();
    matcher(
        format!("has component with class name: \"{}\"", class_name),
        move |intent| {
            intent
                .component()
                .map_or(false, |c| c.class_name() == class_name)
        },
    )
}

pub fn has_data(uri: impl AsRef<str>) -> Matcher {
    let uri = uri.as_ref().to_string();
    matcher(format!("has data: \"{}\"", uri), move |intent| {
        intent.data() == Some(uri.as_str())
    })
}

/// Matches the data parsed as a URI; intents without data or whose data
/// doesn't parse never match.
pub fn has_data_matching(data: UriMatcher) -> Matcher {
    matcher(format!("has data: {}", data.describe()), move |intent| {
        intent
            .data()
            .and_then(uri::parse)
            .map_or(false, |url| data.matches(&url))
    })
}

/// Matches the data exactly as it was set on the intent.
pub fn has_data_string(data: StringMatcher) -> Matcher {
    matcher(format!("has data string: {}", data.describe()), move |intent| {
        intent.data().map_or(false, |d| data.matches(d))
    })
}

pub fn has_type(mime_type: impl AsRef<str>) -> Matcher {
    let mime_type = mime_type.as_ref().to_string();
    matcher(format!("has type: \"{}\"", mime_type), move |intent| {
        intent.mime_type() == Some(mime_type.as_str())
    })
}

/// Matches the package set on the intent itself.
pub fn has_package(package: impl AsRef<str>) -> Matcher {
    let package = package.as_ref().to_string();
    matcher(format!("has pkg: \"{}\"", package), move |intent| {
        intent.package() == Some(package.as_str())
    })
}

/// Matches if an activity in `package` can handle the intent.
pub fn to_package(package: impl AsRef<str>) -> Matcher {
    let package = package.as_ref().to_string();
    matcher(format!("resolvesTo: {}", package), move |intent| {
        intent.can_be_handled_by(&package)
    })
}

pub fn has_extra(key: impl AsRef<str>, value: impl Into<ExtraValue>) -> Matcher {
    let key = key.as_ref().to_string();
    let value = value.into();
    matcher(
        format!("has extras: {{\"{}\": {:?}}}", key, value),
        move |intent| intent.extra(&key) == Some(&value),
    )
}

pub fn has_extra_with_key(key: impl AsRef<str>) -> Matcher {
    let key = key.as_ref().to_string();
    matcher(format!("has extra with key: \"{}\"", key), move |intent| {
        intent.extra(&key).is_some()
    })
}

/// Matches every extra against `extras`, see [`bundle`].
pub fn has_extras(extras: BundleMatcher) -> Matcher {
    matcher(format!("has extras: {}", extras.describe()), move |intent| {
        extras.matches(intent.extras())
    })
}

pub fn has_flag(flag: IntentFlags) -> Matcher {
    has_flags(flag)
}

/// Matches if all of `flags` are set.
pub fn has_flags(flags: IntentFlags) -> Matcher {
    matcher(format!("flags: {:x}", flags.bits()), move |intent| {
        intent.flags().contains(flags)
    })
}

/// See [`Intent::filter_equals`].
pub fn filter_equals(expected: Intent) -> Matcher {
    matcher(format!("filterEquals: {}", expected), move |intent| {
        expected.filter_equals(intent)
    })
}

/// Matches intents that resolve to an activity of the instrumentation's
/// target package.
pub fn is_internal(instrumentation: &Instrumentation) -> Matcher {
    let package_manager = instrumentation.package_manager().clone();
    let target_package = instrumentation.target_package();
    matcher(
        format!("target package: {}", target_package),
        move |intent| {
            package_manager
                .resolve_activity(intent)
                .map_or(false, |info| info.package() == target_package)
        },
    )
}

pub fn all_of(matchers: Vec<Matcher>) -> Matcher {
    let description = join_descriptions(&matchers, " and ");
    matcher(description, move |intent| {
        matchers.iter().all(|m| m.matches(intent))
    })
}

pub fn any_of(matchers: Vec<Matcher>) -> Matcher {
    let description = join_descriptions(&matchers, " or ");
    matcher(description, move |intent| {
        matchers.iter().any(|m| m.matches(intent))
    })
}

pub fn not(inner: Matcher) -> Matcher {
    matcher(format!("not {}", inner.describe()), move |intent| {
        !inner.matches(intent)
    })
}

fn join_descriptions(matchers: &[Matcher], separator: &str) -> String {
    let descriptions: Vec<String> = matchers
        .iter()
        .map(|m| format!("({})", m.describe()))
        .collect();
    format!("({})", descriptions.join(separator))
}

#[cfg(test)]
mod tests {
    use super::*;
    use androidx_test_core::platform::{ActivityInfo, IntentFilter, NoopBehavior};

    fn unresolved(intent: Intent) -> ResolvedIntent {
        ResolvedIntent::new(intent, Vec::new())
    }

    #[test]
    fn simple_matchers() {
        let intent = unresolved(
            Intent::new_with_uri("android.intent.action.VIEW", "https://example.com")
                .with_type("text/html")
                .with_package("com.example")
                .with_category("android.intent.category.BROWSABLE")
                .with_extra("id", 7)
                .with_flags(IntentFlags::ACTIVITY_NEW_TASK | IntentFlags::ACTIVITY_CLEAR_TOP),
        );

        assert!(any_intent().matches(&intent));
        assert!(has_action("android.intent.action.VIEW").matches(&intent));
        assert!(!has_action("android.intent.action.SEND").matches(&intent));
        assert!(has_data("https://example.com").matches(&intent));
        assert!(has_type("text/html").matches(&intent));
        assert!(has_package("com.example").matches(&intent));
        assert!(has_categories(["android.intent.category.BROWSABLE"]).matches(&intent));
        assert!(!has_categories(Vec::<&str>::new()).matches(&intent));
        assert!(has_extra("id", 7).matches(&intent));
        assert!(!has_extra("id", "7").matches(&intent));
        assert!(has_extra_with_key("id").matches(&intent));
        assert!(has_flags(IntentFlags::ACTIVITY_NEW_TASK).matches(&intent));
        assert!(!has_flags(IntentFlags::ACTIVITY_NO_HISTORY).matches(&intent));
    }

    #[test]
    fn component_matchers() {
        let component = ComponentName::new("com.example", "com.example.Detail");
        let intent = unresolved(Intent::for_component(component.clone()));

        assert!(has_component(component).matches(&intent));
        assert!(has_component_class("com.example.Detail").matches(&intent));
        assert!(!has_component_class("Detail").matches(&intent));
        assert!(!has_component_class("com.example.Detail").matches(&unresolved(Intent::new("a"))));
    }

    #[test]
    fn to_package_uses_the_resolved_activities() {
        let package_manager = PackageManager::new();
        package_manager.register_activity(
            ActivityInfo::new(ComponentName::new("com.camera", "com.camera.Capture"), || {
                Box::new(NoopBehavior)
            })
            .with_intent_filter(IntentFilter::new("android.media.action.IMAGE_CAPTURE")),
        );

        let capture = Intent::new("android.media.action.IMAGE_CAPTURE");
        let resolved = ResolvedIntent::resolve(&capture, &package_manager);
        assert!(to_package("com.camera").matches(&resolved));
        assert!(!to_package("com.example").matches(&resolved));
        assert!(!to_package("com.camera").matches(&unresolved(capture)));
    }

    #[test]
    fn combinators() {
        let intent = unresolved(Intent::new("a").with_package("p"));

        assert!(all_of(vec![has_action("a"), has_package("p")]).matches(&intent));
        assert!(!all_of(vec![has_action("a"), has_package("q")]).matches(&intent));
        assert!(any_of(vec![has_action("b"), has_package("p")]).matches(&intent));
        assert!(not(has_action("b")).matches(&intent));
        assert_eq!(
            all_of(vec![has_action("a"), not(has_package("q"))]).describe(),
            "((has action: \"a\") and (not has pkg: \"q\"))"
        );
    }

    #[test]
    fn filter_equals_ignores_extras() {
        let expected = Intent::new("a").with_data("content://x");
        let sent = unresolved(Intent::new("a").with_data("content://x").with_extra("k", true));
        assert!(filter_equals(expected).matches(&sent));
        assert!(!filter_equals(Intent::new("a")).matches(&sent));
    }

    #[test]
    fn value_matcher_overloads() {
        let intent = unresolved(
            Intent::new_with_uri("android.intent.action.VIEW", "geo:0,0?q=coffee")
                .with_flags(IntentFlags::ACTIVITY_NEW_TASK),
        );

        assert!(has_action_matching(starts_with("android.intent.")).matches(&intent));
        assert!(!has_action_matching(contains_string("SEND")).matches(&intent));
        assert!(has_data_string(is("geo:0,0?q=coffee")).matches(&intent));
        assert!(has_data_string(starts_with("geo:")).matches(&intent));
        assert!(!has_data_string(any_string()).matches(&unresolved(Intent::new("a"))));
        assert!(has_flag(IntentFlags::ACTIVITY_NEW_TASK).matches(&intent));
        assert!(!has_flag(IntentFlags::ACTIVITY_CLEAR_TOP).matches(&intent));
        assert_eq!(
            has_data_string(starts_with("geo:")).describe(),
            "has data string: a string starting with \"geo:\""
        );
    }

    #[test]
    fn data_uri_matchers() {
        let view = unresolved(Intent::new_with_uri(
            "android.intent.action.VIEW",
            "https://example.com/items/7?ref=mail",
        ));

        assert!(has_data_matching(uri::has_host("example.com")).matches(&view));
        assert!(has_data_matching(uri::has_path("/items/7")).matches(&view));
        assert!(has_data_matching(uri::has_param_with_value("ref", "mail")).matches(&view));
        assert!(!has_data_matching(uri::has_scheme("http")).matches(&view));
        let no_data = unresolved(Intent::new("a"));
        assert!(!has_data_matching(uri::has_scheme("https")).matches(&no_data));
        assert!(!has_data_matching(uri::has_scheme("x"))
            .matches(&unresolved(Intent::new("a").with_data("not a uri"))));
        assert_eq!(
            has_data_matching(uri::has_scheme("https")).describe(),
            "has data: has scheme: is \"https\""
        );
    }

    #[test]
    fn extras_matchers() {
        let intent = unresolved(
            Intent::new("a")
                .with_extra("id", 7)
                .with_extra("title", "photo"),
        );

        assert!(has_extras(bundle::has_entry("id", 7)).matches(&intent));
        assert!(has_extras(bundle::has_key("title")).matches(&intent));
        assert!(has_extras(bundle::does_not_have_key("missing")).matches(&intent));
        assert!(has_extras(bundle::has_value("photo")).matches(&intent));
        assert!(!has_extras(bundle::is_empty()).matches(&intent));
        assert!(has_extras(bundle::is_empty()).matches(&unresolved(Intent::new("a"))));
        assert_eq!(
            has_extras(bundle::has_key("id")).describe(),
            "has extras: has bundle with: key: is \"id\" value: ANYTHING"
        );
    }
}
