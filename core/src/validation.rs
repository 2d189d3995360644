//! Validation plumbing: issues, severities, rule contracts and profiles.
//!
//! Rules are pure functions over an element context. The reader applies
//! whichever rules the active profile enables, streams the resulting
//! issues to a configurable sink, and aborts the parse only when an
//! issue's severity meets the profile's abort threshold.

use crate::header::{Length, Tag, VR};
use crate::value::PrimitiveValue;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

/// The weight of a validation finding.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Severity {
    /// An observation with no conformance impact.
    Info,
    /// A deviation which readers are expected to tolerate.
    Warning,
    /// A conformance violation.
    Error,
}

/// A single validation finding.
#[derive(Debug, Clone, PartialEq)]
pub struct Issue {
    /// The finding's severity.
    pub severity: Severity,
    /// The tag of the offending element, when attributable.
    pub tag: Option<Tag>,
    /// A human readable description.
    pub message: Cow<'static, str>,
}

impl Issue {
    /// Create a new issue attributed to a data element.
    pub fn new(severity: Severity, tag: Tag, message: impl Into<Cow<'static, str>>) -> Self {
        Issue {
            severity,
            tag: Some(tag),
            message: message.into(),
        }
    }

    /// Create a new issue not attributable to a single element.
    pub fn global(severity: Severity, message: impl Into<Cow<'static, str>>) -> Self {
        Issue {
            severity,
            tag: None,
            message: message.into(),
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.tag {
            Some(tag) => write!(f, "[{:?}] {}: {}", self.severity, tag, self.message),
            None => write!(f, "[{:?}] {}", self.severity, self.message),
        }
    }
}

/// What the reader should do with a rule for a given attribute.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum RuleBehavior {
    /// Do not evaluate the rule.
    Skip,
    /// Evaluate the rule and let its findings count towards
    /// the abort threshold.
    Validate,
    /// Evaluate the rule and record its findings,
    /// never aborting because of them.
    Record,
}

/// The portion of the parse state visible to a validation rule.
#[derive(Debug, Clone, Copy)]
pub struct ElementContext<'a> {
    /// The element's tag.
    pub tag: Tag,
    /// The element's effective value representation.
    pub vr: VR,
    /// The declared value length.
    pub length: Length,
    /// The element's primitive value, when one was materialized.
    pub value: Option<&'a PrimitiveValue>,
}

/// A validation rule: a pure function of the element context.
pub trait ValidationRule: Send + Sync {
    /// Inspect the element context and report at most one finding.
    fn validate(&self, ctx: &ElementContext<'_>) -> Option<Issue>;
}

impl<F> ValidationRule for F
where
    F: Fn(&ElementContext<'_>) -> Option<Issue> + Send + Sync,
{
    fn validate(&self, ctx: &ElementContext<'_>) -> Option<Issue> {
        (self)(ctx)
    }
}

/// A validation profile: the default rule behavior, optional per-tag
/// overrides, and the severity at which the reader gives up.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationProfile {
    name: &'static str,
    default_behavior: RuleBehavior,
    overrides: BTreeMap<Tag, RuleBehavior>,
    abort_threshold: Option<Severity>,
}

impl ValidationProfile {
    /// A profile under which no rule is evaluated.
    pub fn none() -> Self {
        ValidationProfile {
            name: "none",
            default_behavior: RuleBehavior::Skip,
            overrides: BTreeMap::new(),
            abort_threshold: None,
        }
    }

    /// A profile which validates everything and aborts on errors.
    pub fn strict() -> Self {
        ValidationProfile {
            name: "strict",
            default_behavior: RuleBehavior::Validate,
            overrides: BTreeMap::new(),
            abort_threshold: Some(Severity::Error),
        }
    }

    /// A profile which validates everything but only aborts
    /// when parsing cannot meaningfully continue.
    pub fn lenient() -> Self {
        ValidationProfile {
            name: "lenient",
            default_behavior: RuleBehavior::Validate,
            overrides: BTreeMap::new(),
            abort_threshold: None,
        }
    }

    /// A profile which records findings without ever aborting.
    pub fn permissive() -> Self {
        ValidationProfile {
            name: "permissive",
            default_behavior: RuleBehavior::Record,
            overrides: BTreeMap::new(),
            abort_threshold: None,
        }
    }

    /// A custom profile with the given default behavior
    /// and abort threshold.
    pub fn custom(default_behavior: RuleBehavior, abort_threshold: Option<Severity>) -> Self {
        ValidationProfile {
            name: "custom",
            default_behavior,
            overrides: BTreeMap::new(),
            abort_threshold,
        }
    }

    /// Override the behavior for a specific attribute.
    pub fn with_override(mut self, tag: Tag, behavior: RuleBehavior) -> Self {
        self.overrides.insert(tag, behavior);
        self
    }

    /// The profile's name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The behavior to apply when the finding is not attributable
    /// to a specific attribute.
    pub fn default_behavior(&self) -> RuleBehavior {
        self.default_behavior
    }

    /// The behavior to apply for the given attribute.
    pub fn behavior_for(&self, tag: Tag) -> RuleBehavior {
        self.overrides
            .get(&tag)
            .copied()
            .unwrap_or(self.default_behavior)
    }

    /// Whether an issue of the given severity,
    /// raised under the given behavior, should abort the parse.
    pub fn should_abort(&self, behavior: RuleBehavior, severity: Severity) -> bool {
        behavior == RuleBehavior::Validate
            && self
                .abort_threshold
                .map(|threshold| severity >= threshold)
                .unwrap_or(false)
    }
}

impl Default for ValidationProfile {
    fn default() -> Self {
        ValidationProfile::none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profiles_gate_aborting() {
        let strict = ValidationProfile::strict();
        assert!(strict.should_abort(RuleBehavior::Validate, Severity::Error));
        assert!(!strict.should_abort(RuleBehavior::Validate, Severity::Warning));
        assert!(!strict.should_abort(RuleBehavior::Record, Severity::Error));

        let lenient = ValidationProfile::lenient();
        assert!(!lenient.should_abort(RuleBehavior::Validate, Severity::Error));
    }

    #[test]
    fn per_tag_overrides_take_precedence() {
        let profile = ValidationProfile::strict()
            .with_override(Tag(0x0008, 0x0005), RuleBehavior::Skip);
        assert_eq!(
            profile.behavior_for(Tag(0x0008, 0x0005)),
            RuleBehavior::Skip
        );
        assert_eq!(
            profile.behavior_for(Tag(0x0010, 0x0010)),
            RuleBehavior::Validate
        );
    }

    #[test]
    fn closures_are_rules() {
        let rule = |ctx: &ElementContext<'_>| {
            if ctx.length.is_undefined() && ctx.vr != VR::SQ {
                Some(Issue::new(
                    Severity::Error,
                    ctx.tag,
                    "undefined length outside a sequence",
                ))
            } else {
                None
            }
        };
        let ctx = ElementContext {
            tag: Tag(0x0008, 0x0005),
            vr: VR::CS,
            length: Length::UNDEFINED,
            value: None,
        };
        assert!(ValidationRule::validate(&rule, &ctx).is_some());
    }
}
