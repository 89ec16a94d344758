//! Declarative selectors accepted by [`Emitter::on`](crate::Emitter::on).
//!
//! A selector is relative to the emitter it is registered on and is turned
//! into a [`Matcher`] (and validated) at registration time:
//!
//! | selector | matches |
//! |---|---|
//! | `update` | `<namespace>.update` |
//! | `*` | any event emitted directly in `<namespace>` |
//! | `*.*` | any event in `<namespace>` or below |
//! | `agent.tool.update` | exactly that path |
//! | `Regex` | paths the expression matches in full |
//! | `Custom` | whatever the matcher decides |
//!
//! All but `Custom` skip internal events unless the listener opts in.

use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::EmitterError;
use crate::event::EventMeta;
use crate::matcher::Matcher;
use crate::namespace::{Namespace, PATH_SEPARATOR, validate_name, validate_namespace};

#[derive(Clone)]
pub enum Selector {
    /// A leaf name in the registering emitter's namespace.
    Name(String),
    /// Every event emitted directly in the registering emitter's namespace.
    All,
    /// Every event in the registering emitter's namespace or below it.
    Nested,
    /// An exact full path.
    Path(String),
    /// Full-path regular expression.
    Regex(Regex),
    /// An arbitrary matcher.
    Custom(Arc<dyn Matcher>),
}

impl Selector {
    /// Parse the string form: `*`, `*.*`, a leaf name, or a dotted path.
    pub fn parse(input: &str) -> Result<Self, EmitterError> {
        let selector = match input {
            "*" => Self::All,
            "*.*" => Self::Nested,
            s if s.contains(PATH_SEPARATOR) => Self::Path(s.to_string()),
            s => Self::Name(s.to_string()),
        };
        selector.validate()?;
        Ok(selector)
    }

    /// Compile a full-path regular expression selector. The pattern is
    /// anchored at both ends.
    pub fn regex(pattern: &str) -> Result<Self, EmitterError> {
        Regex::new(&format!("^(?:{pattern})$"))
            .map(Self::Regex)
            .map_err(|e| EmitterError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })
    }

    pub fn custom(matcher: impl Matcher + 'static) -> Self {
        Self::Custom(Arc::new(matcher))
    }

    fn validate(&self) -> Result<(), EmitterError> {
        match self {
            Self::Name(name) => validate_name(name)?,
            Self::Path(path) => {
                let segments: Vec<&str> = path.split(PATH_SEPARATOR).collect();
                validate_namespace(segments.as_slice())?;
            }
            Self::All | Self::Nested | Self::Regex(_) | Self::Custom(_) => {}
        }
        Ok(())
    }

    /// Resolve against `namespace`, validating names and paths.
    pub(crate) fn bind(
        self,
        namespace: &Namespace,
        include_internal: bool,
    ) -> Result<Arc<dyn Matcher>, EmitterError> {
        self.validate()?;
        let scope = match self {
            Self::Custom(matcher) => return Ok(matcher),
            Self::Name(name) => Scope::Path(namespace.path_for(&name)),
            Self::Path(path) => Scope::Path(path),
            Self::All => Scope::Own(namespace.clone()),
            Self::Nested => Scope::Below(namespace.clone()),
            Self::Regex(regex) => Scope::Regex(regex),
        };
        Ok(Arc::new(SelectorMatcher {
            scope,
            include_internal,
        }))
    }
}

impl fmt::Debug for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => f.debug_tuple("Name").field(name).finish(),
            Self::All => f.write_str("All"),
            Self::Nested => f.write_str("Nested"),
            Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Self::Regex(regex) => f.debug_tuple("Regex").field(&regex.as_str()).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl FromStr for Selector {
    type Err = EmitterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

enum Scope {
    Path(String),
    Own(Namespace),
    Below(Namespace),
    Regex(Regex),
}

struct SelectorMatcher {
    scope: Scope,
    include_internal: bool,
}

impl Matcher for SelectorMatcher {
    fn matches(&self, event: &EventMeta) -> bool {
        if event.is_internal() && !self.include_internal {
            return false;
        }
        match &self.scope {
            Scope::Path(path) => event.path == *path,
            Scope::Own(namespace) => namespace.owns_path(&event.path),
            Scope::Below(namespace) => namespace.contains_path(&event.path),
            Scope::Regex(regex) => regex.is_match(&event.path),
        }
    }
}
