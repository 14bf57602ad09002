use std::env;
use std::fmt::Write as _;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Parsed test environment configuration.
#[derive(Debug, Clone)]
pub struct TestEnv {
    pub prefix: TestPrefix,
    /// Purge what the suite created. Off when `KEYMANAGER_TEST_KEEP` is set.
    pub cleanup: bool,
}

impl TestEnv {
    pub fn from_env(store: &str) -> Self {
        Self {
            prefix: TestPrefix::from_env(store),
            cleanup: !parse_bool_env("KEYMANAGER_TEST_KEEP"),
        }
    }
}

/// Source of unique, vendor safe ids (letters, digits and dashes).
#[derive(Debug, Clone)]
pub struct TestPrefix {
    base: String,
    counter: Arc<AtomicU64>,
}

impl TestPrefix {
    pub fn from_env(store: &str) -> Self {
        if let Ok(explicit) = env::var("KEYMANAGER_TEST_PREFIX") {
            return Self::new(explicit);
        }

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let pid = std::process::id();
        let mut base = String::new();
        let _ = write!(&mut base, "{store}-{now}-{pid}");
        Self::new(base)
    }

    fn new(base: String) -> Self {
        let base = base
            .chars()
            .map(|ch| if ch.is_ascii_alphanumeric() { ch } else { '-' })
            .collect();
        Self {
            base,
            counter: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn id(&self, suffix: &str) -> String {
        let next = self.counter.fetch_add(1, Ordering::SeqCst);
        format!("{}-{suffix}-{next}", self.base)
    }
}

pub fn parse_bool_env(var: &str) -> bool {
    env::var(var)
        .ok()
        .map(|v| ["1", "true", "yes"].iter().any(|pat| v.eq_ignore_ascii_case(pat)))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_vendor_safe() {
        let prefix = TestPrefix::new("local/test_1".to_string());
        assert_eq!(prefix.base(), "local-test-1");
        let a = prefix.id("key");
        let b = prefix.id("key");
        assert_ne!(a, b);
        assert!(a.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '-'));
    }
}
