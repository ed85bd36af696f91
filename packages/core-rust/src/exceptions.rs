//! Declared exceptions: identities minted per API description.
//!
//! Every [`ExceptionRegistry`] gets a process-unique id, so two descriptions
//! that both declare `NotFound` still produce distinguishable kinds. Handlers
//! raise through [`ExceptionRegistry::raise_by_name`]; clients rebuild the
//! same kind from an error envelope with [`ExceptionRegistry::match_name`].

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::{SetupError, RESERVED_EXCEPTION_NAMES};

static NEXT_REGISTRY_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one declared exception within one registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExceptionKind {
    registry: u64,
    name: Arc<str>,
}

impl ExceptionKind {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A raised declared exception: a kind plus a message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}: {}", .kind.name(), .message)]
pub struct ServiceException {
    kind: ExceptionKind,
    message: String,
}

impl ServiceException {
    #[must_use]
    pub fn kind(&self) -> &ExceptionKind {
        &self.kind
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.kind.name()
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// True when this exception was minted as `kind`.
    #[must_use]
    pub fn is(&self, kind: &ExceptionKind) -> bool {
        &self.kind == kind
    }
}

/// Raised when a caller asks for an exception name the API never declared.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("exception is not declared by the api: {name}")]
pub struct UnknownExceptionError {
    pub name: String,
}

/// The closed set of exceptions one API description declares.
#[derive(Debug)]
pub struct ExceptionRegistry {
    id: u64,
    kinds: BTreeMap<String, ExceptionKind>,
}

impl ExceptionRegistry {
    /// Builds a registry with a fresh identity for every name.
    ///
    /// # Errors
    ///
    /// Returns `SetupError::ReservedException` if a name collides with one of
    /// the framework's wire-level error names.
    pub fn new<I, S>(names: I) -> Result<Self, SetupError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let id = NEXT_REGISTRY_ID.fetch_add(1, Ordering::Relaxed);
        let mut kinds = BTreeMap::new();
        for name in names {
            let name = name.as_ref();
            if RESERVED_EXCEPTION_NAMES.contains(&name) {
                return Err(SetupError::ReservedException {
                    name: name.to_string(),
                });
            }
            kinds.insert(
                name.to_string(),
                ExceptionKind {
                    registry: id,
                    name: Arc::from(name),
                },
            );
        }
        Ok(Self { id, kinds })
    }

    /// Constructs the declared exception `name` carrying `message`.
    ///
    /// # Errors
    ///
    /// Returns `UnknownExceptionError` if `name` is not declared.
    pub fn raise_by_name(
        &self,
        name: &str,
        message: impl Into<String>,
    ) -> Result<ServiceException, UnknownExceptionError> {
        let kind = self.match_name(name).ok_or_else(|| UnknownExceptionError {
            name: name.to_string(),
        })?;
        Ok(ServiceException {
            kind: kind.clone(),
            message: message.into(),
        })
    }

    /// Looks up the kind declared under `name`.
    #[must_use]
    pub fn match_name(&self, name: &str) -> Option<&ExceptionKind> {
        self.kinds.get(name)
    }

    /// True only for exceptions minted by this registry.
    #[must_use]
    pub fn declares(&self, exception: &ServiceException) -> bool {
        exception.kind.registry == self.id && self.kinds.contains_key(exception.name())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.kinds.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raise_declared_exception() {
        let registry = ExceptionRegistry::new(["BadInput", "NotFound"]).unwrap();
        let exc = registry.raise_by_name("BadInput", "need x").unwrap();
        assert_eq!(exc.name(), "BadInput");
        assert_eq!(exc.message(), "need x");
        assert_eq!(exc.to_string(), "BadInput: need x");
        assert!(registry.declares(&exc));
    }

    #[test]
    fn raise_undeclared_name_fails() {
        let registry = ExceptionRegistry::new(["BadInput"]).unwrap();
        let err = registry.raise_by_name("Nope", "x").unwrap_err();
        assert_eq!(err.name, "Nope");
    }

    #[test]
    fn same_name_different_registries_are_distinct() {
        let a = ExceptionRegistry::new(["NotFound"]).unwrap();
        let b = ExceptionRegistry::new(["NotFound"]).unwrap();

        let from_a = a.raise_by_name("NotFound", "gone").unwrap();
        assert!(a.declares(&from_a));
        assert!(!b.declares(&from_a));
        assert!(!from_a.is(b.match_name("NotFound").unwrap()));
        assert!(from_a.is(a.match_name("NotFound").unwrap()));
    }

    #[test]
    fn reserved_names_rejected() {
        let err = ExceptionRegistry::new(["InternalError"]).unwrap_err();
        assert_eq!(
            err,
            SetupError::ReservedException {
                name: "InternalError".to_string()
            }
        );
    }

    #[test]
    fn match_name_misses_return_none() {
        let registry = ExceptionRegistry::new(Vec::<String>::new()).unwrap();
        assert!(registry.is_empty());
        assert!(registry.match_name("Anything").is_none());
    }
}
