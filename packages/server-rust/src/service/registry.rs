use std::collections::HashMap;
use std::sync::Arc;

use switchboard_core::{ApiDescription, SetupError};

use crate::traits::Handler;

// ---------------------------------------------------------------------------
// HandlerRegistry
// ---------------------------------------------------------------------------

/// Maps declared operation names to their handlers.
///
/// Registration validates against the API description: the operation must be
/// declared and may only be bound once.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn Handler>>,
}

impl HandlerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `handler` to the declared operation `name`.
    ///
    /// # Errors
    ///
    /// - `SetupError::UnknownOperation` if `api` does not declare `name`
    /// - `SetupError::DuplicateHandler` if `name` already has a handler
    pub fn register(
        &mut self,
        api: &ApiDescription,
        name: &str,
        handler: Arc<dyn Handler>,
    ) -> Result<(), SetupError> {
        if !api.declares_operation(name) {
            return Err(SetupError::UnknownOperation {
                name: name.to_string(),
            });
        }
        if self.handlers.contains_key(name) {
            return Err(SetupError::DuplicateHandler {
                name: name.to_string(),
            });
        }
        self.handlers.insert(name.to_string(), handler);
        Ok(())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Handler>> {
        self.handlers.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Names of the operations bound so far.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.names().collect();
        names.sort_unstable();
        f.debug_struct("HandlerRegistry")
            .field("operations", &names)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
