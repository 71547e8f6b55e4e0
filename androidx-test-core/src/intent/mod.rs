use std::collections::BTreeSet;
use std::fmt;

use bitflags::bitflags;

use crate::config::VersionCode;

mod action;
pub use action::{Action, Category};

mod extra;
pub use extra::{Bundle, Extra, ExtraValue};

bitflags! {
    /// Launch flags carried by an [`Intent`]
    ///
    /// See [the Intent docs](https://developer.android.com/reference/android/content/Intent#FLAG_ACTIVITY_NEW_TASK)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct IntentFlags: u32 {
        const ACTIVITY_CLEAR_TASK = 0x0000_8000;
        const ACTIVITY_FORWARD_RESULT = 0x0200_0000;
        const ACTIVITY_CLEAR_TOP = 0x0400_0000;
        const ACTIVITY_MULTIPLE_TASK = 0x0800_0000;
        const ACTIVITY_NEW_TASK = 0x1000_0000;
        const ACTIVITY_SINGLE_TOP = 0x2000_0000;
        const ACTIVITY_NO_HISTORY = 0x4000_0000;

        /// Flags that make a launch start (or join) another task.
        const TASK_MASK = Self::ACTIVITY_NEW_TASK.bits()
            | Self::ACTIVITY_CLEAR_TASK.bits()
            | Self::ACTIVITY_MULTIPLE_TASK.bits();
    }
}

impl Default for IntentFlags {
    fn default() -> Self {
        Self::empty()
    }
}

/// Identifies a specific application component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentName {
    package: String,
    class_name: String,
}

impl ComponentName {
    pub fn new(package: impl Into<String>, class_name: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            class_name: class_name.into(),
        }
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// `class_name` with the package prefix collapsed to `.`, if present
    pub fn short_class_name(&self) -> &str {
        self.class_name
            .strip_prefix(self.package.as_str())
            .filter(|rest| rest.starts_with('.'))
            .unwrap_or(&self.class_name)
    }
}

impl fmt::Display for ComponentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.package, self.short_class_name())
    }
}

/// A messaging object you can use to request an action from another android app component.
#[must_use]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Intent {
    action: Option<String>,
    data: Option<String>,
    mime_type: Option<String>,
    package: Option<String>,
    component: Option<ComponentName>,
    categories: BTreeSet<String>,
    identifier: Option<String>,
    flags: IntentFlags,
    extras: Bundle,
}

impl Intent {
    pub fn new(action: impl AsRef<str>) -> Self {
        Self {
            action: Some(action.as_ref().to_string()),
            ..Default::default()
        }
    }

    pub fn new_with_uri(action: impl AsRef<str>, uri: impl AsRef<str>) -> Self {
        Self::new(action).with_data(uri)
    }

    /// An explicit intent for `component` with no action.
    pub fn for_component(component: ComponentName) -> Self {
        Self {
            component: Some(component),
            ..Default::default()
        }
    }

    /// The intent a launcher would use to start `component` as the main entry point.
    pub fn make_main_activity(component: ComponentName) -> Self {
        Self::new(Action::Main)
            .with_component(component)
            .with_category(Category::Launcher)
    }

    pub fn with_action(mut self, action: impl AsRef<str>) -> Self {
        self.action = Some(action.as_ref().to_string());
        self
    }

    pub fn with_data(mut self, uri: impl AsRef<str>) -> Self {
        self.data = Some(uri.as_ref().to_string());
        self
    }

    /// Set an explicit MIME data type.
    pub fn with_type(mut self, type_name: impl AsRef<str>) -> Self {
        self.mime_type = Some(type_name.as_ref().to_string());
        self
    }

    pub fn with_package(mut self, package: impl AsRef<str>) -> Self {
        self.package = Some(package.as_ref().to_string());
        self
    }

    pub fn with_component(mut self, component: ComponentName) -> Self {
        self.component = Some(component);
        self
    }

    pub fn with_category(mut self, category: impl AsRef<str>) -> Self {
        self.categories.insert(category.as_ref().to_string());
        self
    }

    pub fn with_identifier(mut self, identifier: impl AsRef<str>) -> Self {
        self.identifier = Some(identifier.as_ref().to_string());
        self
    }

    /// Replaces all launch flags.
    pub fn with_flags(mut self, flags: IntentFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn add_flags(mut self, flags: IntentFlags) -> Self {
        self.flags |= flags;
        self
    }

    /// Add extended data to the intent.
    /// ```
    /// use androidx_test_core::intent::{Action, Extra, ExtraValue, Intent};
    ///
    /// let intent = Intent::new(Action::Send).with_extra(Extra::Text, "Hello World!");
    /// assert_eq!(
    ///     intent.extra(Extra::Text),
    ///     Some(&ExtraValue::Str("Hello World!".to_string()))
    /// );
    /// ```
    pub fn with_extra(mut self, key: impl AsRef<str>, value: impl Into<ExtraValue>) -> Self {
        self.extras.insert(key.as_ref().to_string(), value.into());
        self
    }

    pub fn action(&self) -> Option<&str> {
        self.action.as_deref()
    }

    pub fn data(&self) -> Option<&str> {
        self.data.as_deref()
    }

    pub fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }

    pub fn package(&self) -> Option<&str> {
        self.package.as_deref()
    }

    pub fn component(&self) -> Option<&ComponentName> {
        self.component.as_ref()
    }

    pub fn categories(&self) -> &BTreeSet<String> {
        &self.categories
    }

    pub fn has_category(&self, category: impl AsRef<str>) -> bool {
        self.categories.contains(category.as_ref())
    }

    pub fn identifier(&self) -> Option<&str> {
        self.identifier.as_deref()
    }

    pub fn flags(&self) -> IntentFlags {
        self.flags
    }

    pub fn extras(&self) -> &Bundle {
        &self.extras
    }

    pub fn extra(&self, key: impl AsRef<str>) -> Option<&ExtraValue> {
        self.extras.get(key.as_ref())
    }

    pub fn string_extra(&self, key: impl AsRef<str>) -> Option<&str> {
        match self.extra(key) {
            Some(ExtraValue::Str(s)) => Some(s),
            _ => None,
        }
    }

    pub fn int_extra(&self, key: impl AsRef<str>) -> Option<i64> {
        match self.extra(key) {
            Some(ExtraValue::Int(i)) => Some(*i),
            _ => None,
        }
    }

    pub fn intent_extra(&self, key: impl AsRef<str>) -> Option<&Intent> {
        match self.extra(key) {
            Some(ExtraValue::Intent(intent)) => Some(intent),
            _ => None,
        }
    }

    pub fn bundle_extra(&self, key: impl AsRef<str>) -> Option<&Bundle> {
        match self.extra(key) {
            Some(ExtraValue::Bundle(bundle)) => Some(bundle),
            _ => None,
        }
    }

    /// Intent resolution equality: action, data, type, identifier, package,
    /// component and categories. Extras and flags are ignored.
    pub fn filter_equals(&self, other: &Intent) -> bool {
        self.action == other.action
            && self.data == other.data
            && self.mime_type == other.mime_type
            && self.identifier == other.identifier
            && self.package == other.package
            && self.component == other.component
            && self.categories == other.categories
    }

    /// Whether `other`, the intent an activity was actually started with,
    /// belongs to a launch that was requested with this intent.
    ///
    /// Same as [`Intent::filter_equals`] except that the component is only
    /// compared when this intent names one (an implicit request matches
    /// whatever component it resolved to), and the identifier is only
    /// compared on platforms that support it.
    pub fn filter_matches(&self, other: &Intent, sdk_int: i32) -> bool {
        if self.component.is_some() && self.component != other.component {
            return false;
        }
        if sdk_int >= i32::from(VersionCode::Q) && self.identifier != other.identifier {
            return false;
        }
        self.action == other.action
            && self.data == other.data
            && self.mime_type == other.mime_type
            && self.package == other.package
            && self.categories == other.categories
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Intent {{")?;
        if let Some(action) = &self.action {
            write!(f, " act={}", action)?;
        }
        if !self.categories.is_empty() {
            let cats: Vec<&str> = self.categories.iter().map(String::as_str).collect();
            write!(f, " cat=[{}]", cats.join(","))?;
        }
        if let Some(data) = &self.data {
            write!(f, " dat={}", data)?;
        }
        if let Some(mime_type) = &self.mime_type {
            write!(f, " typ={}", mime_type)?;
        }
        if !self.flags.is_empty() {
            write!(f, " flg={:#x}", self.flags.bits())?;
        }
        if let Some(package) = &self.package {
            write!(f, " pkg={}", package)?;
        }
        if let Some(component) = &self.component {
            write!(f, " cmp={}", component)?;
        }
        if let Some(identifier) = &self.identifier {
            write!(f, " id={}", identifier)?;
        }
        if !self.extras.is_empty() {
            write!(f, " (has extras)")?;
        }
        write!(f, " }}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn component() -> ComponentName {
        ComponentName::new("com.example", "com.example.MainActivity")
    }

    #[test]
    fn filter_equals_ignores_extras_and_flags() {
        let a = Intent::new(Action::View)
            .with_data("https://example.com")
            .with_extra(Extra::Text, "a");
        let b = Intent::new(Action::View)
            .with_data("https://example.com")
            .with_flags(IntentFlags::ACTIVITY_NEW_TASK);
        assert!(a.filter_equals(&b));
        assert!(!a.filter_equals(&b.clone().with_category(Category::Browsable)));
    }

    #[test]
    fn implicit_start_intent_matches_any_resolved_component() {
        let start = Intent::new(Action::View).with_data("content://x");
        let resolved = start.clone().with_component(component());
        assert!(start.filter_matches(&resolved, 33));
        assert!(!resolved.filter_matches(
            &start
                .clone()
                .with_component(ComponentName::new("com.example", "com.example.Other")),
            33
        ));
    }

    #[test]
    fn categories_compare_as_sets() {
        let a = Intent::for_component(component())
            .with_category(Category::Default)
            .with_category(Category::Launcher);
        let b = Intent::for_component(component())
            .with_category(Category::Launcher)
            .with_category(Category::Default);
        assert!(a.filter_matches(&b, 33));
    }

    #[test]
    fn identifier_only_compared_on_recent_platforms() {
        let a = Intent::for_component(component()).with_identifier("one");
        let b = Intent::for_component(component()).with_identifier("two");
        assert!(a.filter_matches(&b, 28));
        assert!(!a.filter_matches(&b, 29));
    }

    #[test]
    fn task_mask_strips_only_task_flags() {
        let flags = IntentFlags::ACTIVITY_NEW_TASK
            | IntentFlags::ACTIVITY_CLEAR_TASK
            | IntentFlags::ACTIVITY_SINGLE_TOP;
        assert_eq!(
            flags - IntentFlags::TASK_MASK,
            IntentFlags::ACTIVITY_SINGLE_TOP
        );
    }

    #[test]
    fn display_is_compact() {
        let intent = Intent::make_main_activity(component());
        assert_eq!(
            intent.to_string(),
            "Intent { act=android.intent.action.MAIN cat=[android.intent.category.LAUNCHER] \
             cmp=com.example/.MainActivity }"
        );
    }
}
