use std::fmt;

use androidx_test_core::{Intent, Result, TestError};

use crate::matcher::{IntentMatcher, ResolvedIntent};

/// A recorded intent plus whether some verification has accounted for it.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiableIntent {
    resolved: ResolvedIntent,
    verified: bool,
}

impl VerifiableIntent {
    pub fn new(resolved: ResolvedIntent) -> Self {
        Self {
            resolved,
            verified: false,
        }
    }

    pub fn resolved_intent(&self) -> &ResolvedIntent {
        &self.resolved
    }

    pub fn intent(&self) -> &Intent {
        self.resolved.intent()
    }

    pub fn is_verified(&self) -> bool {
        self.verified
    }

    pub fn mark_as_verified(&mut self) {
        self.verified = true;
    }
}

impl fmt::Display for VerifiableIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.resolved)?;
        if self.verified {
            write!(f, " VERIFIED")?;
        }
        Ok(())
    }
}

/// How many recorded intents a verification expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationMode {
    /// Exactly this many recorded intents match.
    Times(usize),
    /// None of the recorded intents is left unverified.
    NoUnverifiedIntents,
}

impl VerificationMode {
    /// Checks `intents` against `matcher`.
    ///
    /// For [`VerificationMode::Times`] the matching intents are only marked
    /// verified when the count is right.
    pub fn verify(
        &self,
        matcher: &dyn IntentMatcher,
        intents: &mut [VerifiableIntent],
    ) -> Result<()> {
        match *self {
            VerificationMode::Times(expected) => {
                let matched: Vec<usize> = intents
                    .iter()
                    .enumerate()
                    .filter(|(_, intent)| matcher.matches(intent.resolved_intent()))
                    .map(|(index, _)| index)
                    .collect();
                if matched.len() != expected {
                    let matched_intents: Vec<&VerifiableIntent> =
                        matched.iter().map(|&index| &intents[index]).collect();
                    return Err(TestError::AssertionFailed(format!(
                        "Wanted to match {} intents. Actually matched {} intents.\n\n\
                         IntentMatcher: {}\n\n\
                         Matched intents:{}\n\n\
                         Recorded intents:{}",
                        expected,
                        matched.len(),
                        matcher.describe(),
                        list(matched_intents.into_iter()),
                        list(intents.iter()),
                    )));
                }
                for index in matched {
                    intents[index].mark_as_verified();
                }
                Ok(())
            }
            VerificationMode::NoUnverifiedIntents => {
                let unverified: Vec<&VerifiableIntent> = intents
                    .iter()
                    .filter(|intent| !intent.is_verified())
                    .filter(|intent| matcher.matches(intent.resolved_intent()))
                    .collect();
                if !unverified.is_empty() {
                    return Err(TestError::AssertionFailed(format!(
                        "Found unverified intents.\n\n\
                         Unverified intents:{}\n\n\
                         Recorded intents:{}",
                        list(unverified.into_iter()),
                        list(intents.iter()),
                    )));
                }
                Ok(())
            }
        }
    }
}

fn list<'a>(intents: impl Iterator<Item = &'a VerifiableIntent>) -> String {
    let lines: Vec<String> = intents.map(|intent| format!("\n-{}", intent)).collect();
    if lines.is_empty() {
        "[]".to_string()
    } else {
        lines.concat()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::{any_intent, has_action};

    fn recorded(actions: &[&str]) -> Vec<VerifiableIntent> {
        actions
            .iter()
            .map(|action| ResolvedIntent::new(Intent::new(action), Vec::new()))
            .map(VerifiableIntent::new)
            .collect()
    }

    fn verified(intents: &[VerifiableIntent]) -> Vec<bool> {
        intents.iter().map(VerifiableIntent::is_verified).collect()
    }

    #[test]
    fn times_marks_matches_only_on_success() {
        let mut intents = recorded(&["a", "b", "a"]);

        let err = VerificationMode::Times(1)
            .verify(&*has_action("a"), &mut intents)
            .unwrap_err();
        assert!(matches!(err, TestError::AssertionFailed(_)));
        assert_eq!(verified(&intents), vec![false, false, false]);

        VerificationMode::Times(2)
            .verify(&*has_action("a"), &mut intents)
            .unwrap();
        assert_eq!(verified(&intents), vec![true, false, true]);
    }

    #[test]
    fn times_zero_means_never_sent() {
        let mut intents = recorded(&["a"]);
        VerificationMode::Times(0)
            .verify(&*has_action("b"), &mut intents)
            .unwrap();
        assert!(VerificationMode::Times(0)
            .verify(&*has_action("a"), &mut intents)
            .is_err());
    }

    #[test]
    fn unverified_intents_are_reported() {
        let mut intents = recorded(&["a", "b"]);
        VerificationMode::Times(1)
            .verify(&*has_action("a"), &mut intents)
            .unwrap();

        match VerificationMode::NoUnverifiedIntents.verify(&*any_intent(), &mut intents) {
            Err(TestError::AssertionFailed(msg)) => {
                assert!(msg.starts_with("Found unverified intents."));
                assert!(msg.contains("Unverified intents:\n-Intent { act=b }"));
                assert!(msg.contains("act=a } VERIFIED"));
            }
            other => panic!("unexpected {:?}", other),
        }

        VerificationMode::Times(1)
            .verify(&*has_action("b"), &mut intents)
            .unwrap();
        VerificationMode::NoUnverifiedIntents
            .verify(&*any_intent(), &mut intents)
            .unwrap();
    }

    #[test]
    fn failure_lists_the_matcher_and_recorded_intents() {
        let mut intents = recorded(&["a"]);
        let err = VerificationMode::Times(1)
            .verify(&*has_action("b"), &mut intents)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Wanted to match 1 intents. Actually matched 0 intents.\n\n\
             IntentMatcher: has action: \"b\"\n\n\
             Matched intents:[]\n\n\
             Recorded intents:\n-Intent { act=a }"
        );
    }
}
