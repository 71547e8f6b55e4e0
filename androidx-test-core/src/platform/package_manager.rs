use std::fmt;
use std::sync::{Arc, RwLock};

use crate::intent::{ComponentName, Intent};

use super::activity::ActivityBehavior;

/// Creates the behavior of a fresh activity instance.
pub type ActivityFactory = Arc<dyn Fn() -> Box<dyn ActivityBehavior> + Send + Sync + 'static>;

/// Describes which implicit intents an activity accepts.
///
/// An intent matches when its action is listed, every one of its categories
/// is listed, and its data scheme and MIME type (if any) are listed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntentFilter {
    actions: Vec<String>,
    categories: Vec<String>,
    data_schemes: Vec<String>,
    mime_types: Vec<String>,
}

impl IntentFilter {
    pub fn new(action: impl AsRef<str>) -> Self {
        Self::default().with_action(action)
    }

    pub fn with_action(mut self, action: impl AsRef<str>) -> Self {
        self.actions.push(action.as_ref().to_string());
        self
    }

    pub fn with_category(mut self, category: impl AsRef<str>) -> Self {
        self.categories.push(category.as_ref().to_string());
        self
    }

    pub fn with_data_scheme(mut self, scheme: impl AsRef<str>) -> Self {
        self.data_schemes.push(scheme.as_ref().to_string());
        self
    }

    /// `mime_type` may use a `type/*` wildcard.
    pub fn with_mime_type(mut self, mime_type: impl AsRef<str>) -> Self {
        self.mime_types.push(mime_type.as_ref().to_string());
        self
    }

    pub fn matches(&self, intent: &Intent) -> bool {
        let Some(action) = intent.action() else {
            return false;
        };
        if !self.actions.iter().any(|a| a == action) {
            return false;
        }
        if !intent
            .categories()
            .iter()
            .all(|c| self.categories.iter().any(|fc| fc == c))
        {
            return false;
        }
        let scheme_ok = match intent.data() {
            Some(data) => data
                .split_once(':')
                .map_or(false, |(scheme, _)| self.data_schemes.iter().any(|s| s == scheme)),
            None => self.data_schemes.is_empty(),
        };
        if !scheme_ok {
            return false;
        }
        match intent.mime_type() {
            Some(mime_type) => self.mime_types.iter().any(|m| mime_matches(m, mime_type)),
            None => self.mime_types.is_empty(),
        }
    }
}

fn mime_matches(pattern: &str, mime_type: &str) -> bool {
    if pattern == "*/*" || pattern == mime_type {
        return true;
    }
    match pattern.strip_suffix("/*") {
        Some(major) => mime_type
            .split_once('/')
            .map_or(false, |(mime_major, _)| mime_major == major),
        None => false,
    }
}

/// A manifest entry for one activity component.
#[derive(Clone)]
pub struct ActivityInfo {
    component: ComponentName,
    floating: bool,
    filters: Vec<IntentFilter>,
    factory: ActivityFactory,
}

impl fmt::Debug for ActivityInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivityInfo")
            .field("component", &self.component)
            .field("floating", &self.floating)
            .field("filters", &self.filters)
            .finish()
    }
}

impl ActivityInfo {
    pub fn new<F>(component: ComponentName, factory: F) -> Self
    where
        F: Fn() -> Box<dyn ActivityBehavior> + Send + Sync + 'static,
    {
        Self {
            component,
            floating: false,
            filters: Vec::new(),
            factory: Arc::new(factory),
        }
    }

    /// Marks the activity as translucent / dialog-themed.
    pub fn floating(mut self, floating: bool) -> Self {
        self.floating = floating;
        self
    }

    pub fn with_intent_filter(mut self, filter: IntentFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn component(&self) -> &ComponentName {
        &self.component
    }

    pub fn is_floating(&self) -> bool {
        self.floating
    }

    pub fn intent_filters(&self) -> &[IntentFilter] {
        &self.filters
    }

    pub(crate) fn instantiate(&self) -> Box<dyn ActivityBehavior> {
        (self.factory)()
    }
}

/// One candidate component an intent resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolveInfo {
    component: ComponentName,
}

impl ResolveInfo {
    pub fn component(&self) -> &ComponentName {
        &self.component
    }

    pub fn package(&self) -> &str {
        self.component.package()
    }
}

/// The set of activities installed in the process, keyed by component.
#[derive(Clone, Default)]
pub struct PackageManager {
    activities: Arc<RwLock<Vec<ActivityInfo>>>,
}

impl fmt::Debug for PackageManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.activities.read().unwrap().iter().map(|info| &info.component))
            .finish()
    }
}

impl PackageManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `info`, replacing any activity already registered under the
    /// same component.
    pub fn register_activity(&self, info: ActivityInfo) {
        log::trace!("Registering activity {}", info.component);
        let mut guard = self.activities.write().unwrap();
        guard.retain(|existing| existing.component != info.component);
        guard.push(info);
    }

    pub fn activity_info(&self, component: &ComponentName) -> Option<ActivityInfo> {
        self.activities
            .read()
            .unwrap()
            .iter()
            .find(|info| &info.component == component)
            .cloned()
    }

    /// Every activity that could handle `intent`, in registration order.
    ///
    /// An explicit component short-circuits filter matching; an explicit
    /// package restricts the candidates to that package.
    pub fn query_intent_activities(&self, intent: &Intent) -> Vec<ResolveInfo> {
        let guard = self.activities.read().unwrap();
        if let Some(component) = intent.component() {
            return guard
                .iter()
                .filter(|info| &info.component == component)
                .map(|info| ResolveInfo {
                    component: info.component.clone(),
                })
                .collect();
        }
        guard
            .iter()
            .filter(|info| intent.package().map_or(true, |p| info.component.package() == p))
            .filter(|info| info.filters.iter().any(|filter| filter.matches(intent)))
            .map(|info| ResolveInfo {
                component: info.component.clone(),
            })
            .collect()
    }

    pub fn resolve_activity(&self, intent: &Intent) -> Option<ResolveInfo> {
        self.query_intent_activities(intent).into_iter().next()
    }
}
