use crate::errors::{CollectorResult, NotFoundError, PreconditionError};
use std::collections::HashMap;

/// Live sessions (battles, raids, expeditions) addressed by a session key,
/// usually a channel or user id. One session per key.
#[derive(Debug, Clone)]
pub struct SessionRegistry<S> {
    sessions: HashMap<String, S>,
}

impl<S> Default for SessionRegistry<S> {
    fn default() -> Self {
        SessionRegistry {
            sessions: HashMap::new(),
        }
    }
}

impl<S> SessionRegistry<S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, key: &str, session: S) -> CollectorResult<&mut S> {
        if self.sessions.contains_key(key) {
            return Err(PreconditionError::SessionActive(key.to_string()).into());
        }
        Ok(self.sessions.entry(key.to_string()).or_insert(session))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.sessions.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&S> {
        self.sessions.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut S> {
        self.sessions.get_mut(key)
    }

    pub fn require(&self, key: &str) -> CollectorResult<&S> {
        self.sessions
            .get(key)
            .ok_or_else(|| NotFoundError::Session(key.to_string()).into())
    }

    pub fn require_mut(&mut self, key: &str) -> CollectorResult<&mut S> {
        self.sessions
            .get_mut(key)
            .ok_or_else(|| NotFoundError::Session(key.to_string()).into())
    }

    pub fn destroy(&mut self, key: &str) -> Option<S> {
        self.sessions.remove(key)
    }

    /// Keys in sorted order, so ticks visit sessions deterministically.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.sessions.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &S)> {
        self.sessions.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// First session matching `pred`, with its key.
    pub fn find(&self, mut pred: impl FnMut(&S) -> bool) -> Option<(&str, &S)> {
        self.iter().find(|(_, s)| pred(*s))
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::CollectorError;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_one_session_per_key() {
        let mut registry = SessionRegistry::new();
        registry.create("general", 1u32).unwrap();

        assert_eq!(
            registry.create("general", 2).unwrap_err(),
            PreconditionError::SessionActive("general".to_string()).into()
        );
        assert_eq!(registry.get("general"), Some(&1));

        registry.create("trading", 3).unwrap();
        assert_eq!(registry.keys(), vec!["general".to_string(), "trading".to_string()]);
    }

    #[test]
    fn test_destroy_frees_key() {
        let mut registry = SessionRegistry::new();
        *registry.create("general", 1u32).unwrap() += 10;
        assert_eq!(registry.destroy("general"), Some(11));
        assert!(registry.is_empty());
        assert!(matches!(
            registry.require("general"),
            Err(CollectorError::NotFound(NotFoundError::Session(_)))
        ));
        registry.create("general", 5).unwrap();
    }

    #[test]
    fn test_find_by_content() {
        let mut registry = SessionRegistry::new();
        registry.create("a", 1u32).unwrap();
        registry.create("b", 7u32).unwrap();
        assert_eq!(registry.find(|s| *s > 5), Some(("b", &7)));
        assert_eq!(registry.find(|s| *s > 50), None);
    }
}
