//! Unique, length-capped names for tables and columns

use std::collections::HashSet;

/// Default cap for column names
pub const DEFAULT_MAX_COLUMN_SIZE: usize = 2000;

/// Hands out names that are unique within one table set or header row
///
/// Over-long names keep their trailing characters, which carry the most
/// specific part of a path. Collisions get a numeric suffix (`Name1`,
/// `Name2`, ...) that always fits within the cap.
#[derive(Debug, Clone)]
pub struct UniqueNameGenerator {
    used: HashSet<String>,
    max_len: usize,
}

impl UniqueNameGenerator {
    /// # Arguments
    /// * `max_len` - Length cap in characters; `None` uses the column default
    pub fn new(max_len: Option<usize>) -> Self {
        Self {
            used: HashSet::new(),
            max_len: max_len.unwrap_or(DEFAULT_MAX_COLUMN_SIZE).max(1),
        }
    }

    /// Reserve and return the next unique variant of `name`
    pub fn next_unique(&mut self, name: &str) -> String {
        let base = tail(name, self.max_len);
        let mut candidate = base.clone();
        let mut counter = 1usize;

        while self.used.contains(&candidate) {
            let suffix = counter.to_string();
            let room = self.max_len.saturating_sub(suffix.chars().count());
            candidate = format!("{}{suffix}", tail(&base, room));
            counter += 1;
        }

        self.used.insert(candidate.clone());
        candidate
    }
}

impl Default for UniqueNameGenerator {
    fn default() -> Self {
        Self::new(None)
    }
}

/// Last `max` characters of `s`
fn tail(s: &str, max: usize) -> String {
    let len = s.chars().count();
    if len <= max {
        s.to_string()
    } else {
        s.chars().skip(len - max).collect()
    }
}
