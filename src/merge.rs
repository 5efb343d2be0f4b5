//! Layering of per-call options over instance defaults.
//!
//! Rules, per field:
//! - scalars: the override replaces the base when set
//! - headers: union of names, override wins per (case-insensitive) name
//! - sequences: base items followed by override items
//! - mappings: merged recursively
//! - hooks: base hooks fire before override hooks
//! - anything else (e.g. `retry: false` over a policy): the override replaces
//!
//! Neither input is mutated; the result owns its own copies.

use reqwest::header::HeaderMap;
use serde_json::{Map, Value};

use crate::{GretchOptions, Hooks, RetryOptions, RetrySetting};

/// Combines two values of the same configuration type.
pub trait Merge {
    fn merge(&self, overrides: &Self) -> Self;
}

/// Merges `overrides` over `base`. See the module docs for the rules.
pub fn merge(base: &GretchOptions, overrides: &GretchOptions) -> GretchOptions {
    base.merge(overrides)
}

fn replace<T: Clone>(base: &Option<T>, overrides: &Option<T>) -> Option<T> {
    overrides.as_ref().or(base.as_ref()).cloned()
}

fn concat<T: Clone>(base: &Option<Vec<T>>, overrides: &Option<Vec<T>>) -> Option<Vec<T>> {
    match (base, overrides) {
        (Some(base), Some(overrides)) => Some(base.iter().chain(overrides).cloned().collect()),
        _ => replace(base, overrides),
    }
}

impl Merge for HeaderMap {
    fn merge(&self, overrides: &Self) -> Self {
        let mut merged = self.clone();
        for name in overrides.keys() {
            merged.remove(name);
            for value in overrides.get_all(name) {
                merged.append(name.clone(), value.clone());
            }
        }
        merged
    }
}

impl Merge for Value {
    fn merge(&self, overrides: &Self) -> Self {
        match (self, overrides) {
            (Value::Array(base), Value::Array(overrides)) => {
                Value::Array(base.iter().chain(overrides).cloned().collect())
            }
            (Value::Object(base), Value::Object(overrides)) => Value::Object(base.merge(overrides)),
            (_, overrides) => overrides.clone(),
        }
    }
}

impl Merge for Map<String, Value> {
    fn merge(&self, overrides: &Self) -> Self {
        let mut merged = self.clone();
        for (key, value) in overrides {
            let combined = match self.get(key) {
                Some(base) => base.merge(value),
                None => value.clone(),
            };
            merged.insert(key.clone(), combined);
        }
        merged
    }
}

impl Merge for RetryOptions {
    fn merge(&self, overrides: &Self) -> Self {
        Self {
            attempts: replace(&self.attempts, &overrides.attempts),
            codes: concat(&self.codes, &overrides.codes),
            methods: concat(&self.methods, &overrides.methods),
            delay_ms: replace(&self.delay_ms, &overrides.delay_ms),
        }
    }
}

impl Merge for RetrySetting {
    fn merge(&self, overrides: &Self) -> Self {
        match (self, overrides) {
            (RetrySetting::Policy(base), RetrySetting::Policy(overrides)) => {
                RetrySetting::Policy(base.merge(overrides))
            }
            (_, overrides) => overrides.clone(),
        }
    }
}

impl Merge for Hooks {
    fn merge(&self, overrides: &Self) -> Self {
        Self {
            before: self.before.iter().chain(&overrides.before).cloned().collect(),
            after: self.after.iter().chain(&overrides.after).cloned().collect(),
        }
    }
}

impl Merge for GretchOptions {
    fn merge(&self, overrides: &Self) -> Self {
        let retry = match (&self.retry, &overrides.retry) {
            (Some(base), Some(overrides)) => Some(base.merge(overrides)),
            (base, overrides) => replace(base, overrides),
        };

        Self {
            method: replace(&self.method, &overrides.method),
            headers: self.headers.merge(&overrides.headers),
            body: replace(&self.body, &overrides.body),
            json: match (&self.json, &overrides.json) {
                (Some(base), Some(overrides)) => Some(base.merge(overrides)),
                (base, overrides) => replace(base, overrides),
            },
            timeout_ms: replace(&self.timeout_ms, &overrides.timeout_ms),
            retry,
            hooks: self.hooks.merge(&overrides.hooks),
            base_url: replace(&self.base_url, &overrides.base_url),
            extra: self.extra.merge(&overrides.extra),
        }
    }
}
