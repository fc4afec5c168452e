//! Priority-ordered table mapping path elements onto subtask factories.

use std::sync::Arc;

use tracing::debug;
use url::Url;

use super::subtask::{SubtaskFactory, SubtaskPriority};
use crate::account::Account;
use crate::mime::MimeType;

/// What a registration predicate sees when matching a path element.
#[derive(Debug, Clone, Copy)]
pub struct SubtaskQuery<'a> {
    /// Content type of the element.
    pub content_type: &'a MimeType,
    /// Address the element will be fetched from, when known.
    pub target: Option<&'a Url>,
    /// Account the borrow runs for.
    pub account: &'a Account,
}

/// Predicate deciding whether a registration handles an element.
pub type SubtaskPredicate = Box<dyn Fn(&SubtaskQuery<'_>) -> bool + Send + Sync>;

struct Registration {
    priority: SubtaskPriority,
    matches: SubtaskPredicate,
    factory: Arc<dyn SubtaskFactory>,
}

/// Ordered `(priority, predicate, factory)` registrations.
///
/// Lookups consult Specialized registrations first, then General, then
/// Fallback; within one priority, registration order decides. The first
/// matching predicate wins. Built once and shared read-only.
pub struct SubtaskRegistry {
    registrations: Vec<Registration>,
}

impl SubtaskRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            registrations: Vec::new(),
        }
    }

    /// Registers `factory` for elements matching `matches`.
    #[tracing::instrument(skip(self, matches, factory), fields(subtask_name))]
    pub fn register<F>(
        &mut self,
        priority: SubtaskPriority,
        matches: F,
        factory: Arc<dyn SubtaskFactory>,
    ) where
        F: Fn(&SubtaskQuery<'_>) -> bool + Send + Sync + 'static,
    {
        tracing::Span::current().record("subtask_name", factory.name());
        debug!(name = factory.name(), ?priority, "Registering subtask");
        self.registrations.push(Registration {
            priority,
            matches: Box::new(matches),
            factory,
        });
    }

    /// Returns the number of registrations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Returns the factory for an element, if any registration matches.
    #[must_use]
    #[tracing::instrument(skip(self, query), fields(content_type = %query.content_type))]
    pub fn find_subtask_for(&self, query: &SubtaskQuery<'_>) -> Option<Arc<dyn SubtaskFactory>> {
        let found = self
            .registrations
            .iter()
            .enumerate()
            .filter(|(_, registration)| (registration.matches)(query))
            .min_by_key(|(index, registration)| (registration.priority, *index))
            .map(|(_, registration)| Arc::clone(&registration.factory));

        match &found {
            Some(factory) => debug!(subtask = factory.name(), "Subtask matched"),
            None => debug!("No subtask matched"),
        }
        found
    }
}

impl std::fmt::Debug for SubtaskRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self
            .registrations
            .iter()
            .map(|registration| registration.factory.name())
            .collect();
        f.debug_struct("SubtaskRegistry")
            .field("subtask_count", &self.registrations.len())
            .field("subtasks", &names)
            .finish()
    }
}

impl Default for SubtaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashSet;

    use async_trait::async_trait;

    use super::*;
    use crate::account::AccountId;
    use crate::borrow::context::BorrowContext;
    use crate::borrow::subtask::{Subtask, SubtaskError};
    use crate::database::InMemoryBookDatabase;
    use crate::mime;

    struct Noop;

    #[async_trait]
    impl Subtask for Noop {
        async fn execute(&mut self, _ctx: &mut BorrowContext<'_>) -> Result<(), SubtaskError> {
            Ok(())
        }
    }

    struct Named(&'static str);

    impl SubtaskFactory for Named {
        fn name(&self) -> &'static str {
            self.0
        }

        fn create_subtask(&self) -> Box<dyn Subtask> {
            Box::new(Noop)
        }
    }

    fn account() -> Account {
        Account::new(
            AccountId::new("a"),
            Url::parse("https://library.example/").unwrap(),
            HashSet::<String>::new(),
            Arc::new(InMemoryBookDatabase::new(std::env::temp_dir())),
        )
    }

    fn find(registry: &SubtaskRegistry, content_type: &str) -> Option<&'static str> {
        let account = account();
        let content_type = MimeType::parse(content_type).unwrap();
        registry
            .find_subtask_for(&SubtaskQuery {
                content_type: &content_type,
                target: None,
                account: &account,
            })
            .map(|factory| factory.name())
    }

    #[test]
    fn test_priority_beats_registration_order() {
        let mut registry = SubtaskRegistry::new();
        registry.register(SubtaskPriority::Fallback, |_| true, Arc::new(Named("fallback")));
        registry.register(
            SubtaskPriority::General,
            |q| q.content_type.is(mime::EPUB),
            Arc::new(Named("epub")),
        );
        assert_eq!(find(&registry, mime::EPUB), Some("epub"));
        assert_eq!(find(&registry, mime::PDF), Some("fallback"));
    }

    #[test]
    fn test_first_registration_wins_within_priority() {
        let mut registry = SubtaskRegistry::new();
        registry.register(SubtaskPriority::General, |_| true, Arc::new(Named("first")));
        registry.register(SubtaskPriority::General, |_| true, Arc::new(Named("second")));
        assert_eq!(find(&registry, mime::EPUB), Some("first"));
    }

    #[test]
    fn test_no_match_is_none() {
        let mut registry = SubtaskRegistry::new();
        registry.register(
            SubtaskPriority::General,
            |q| q.content_type.is(mime::PDF),
            Arc::new(Named("pdf")),
        );
        assert_eq!(find(&registry, mime::EPUB), None);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_debug_lists_names() {
        let mut registry = SubtaskRegistry::new();
        registry.register(SubtaskPriority::General, |_| true, Arc::new(Named("only")));
        let rendered = format!("{registry:?}");
        assert!(rendered.contains("only"));
    }
}
