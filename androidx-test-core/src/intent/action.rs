/// Action to invoke with an intent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Main,
    View,
    Send,
    Edit,
    Pick,
    Dial,
    Call,
    Chooser,
}

impl AsRef<str> for Action {
    fn as_ref(&self) -> &str {
        match self {
            Self::Main => "android.intent.action.MAIN",
            Self::View => "android.intent.action.VIEW",
            Self::Send => "android.intent.action.SEND",
            Self::Edit => "android.intent.action.EDIT",
            Self::Pick => "android.intent.action.PICK",
            Self::Dial => "android.intent.action.DIAL",
            Self::Call => "android.intent.action.CALL",
            Self::Chooser => "android.intent.action.CHOOSER",
        }
    }
}

/// Category of component that should handle an intent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Default,
    Launcher,
    Browsable,
}

impl AsRef<str> for Category {
    fn as_ref(&self) -> &str {
        match self {
            Self::Default => "android.intent.category.DEFAULT",
            Self::Launcher => "android.intent.category.LAUNCHER",
            Self::Browsable => "android.intent.category.BROWSABLE",
        }
    }
}
