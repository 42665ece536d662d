use std::env;

/// Safety ceilings applied while tokenizing and digesting a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserOptions {
    /// Deepest parenthesis nesting the tokenizer accepts.
    pub max_depth: usize,
    /// Upper bound on reduction steps and group-digestion loops per parse.
    pub max_iterations: usize,
}

pub const DEFAULT_MAX_DEPTH: usize = 64;
pub const DEFAULT_MAX_ITERATIONS: usize = 10_000;

impl Default for ParserOptions {
    fn default() -> Self {
        ParserOptions {
            max_depth: DEFAULT_MAX_DEPTH,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

impl ParserOptions {
    /// Read `SAQL_MAX_DEPTH` and `SAQL_MAX_ITERATIONS`, falling back to the
    /// defaults for missing or unparsable values.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_depth: read_env("SAQL_MAX_DEPTH").unwrap_or(defaults.max_depth),
            max_iterations: read_env("SAQL_MAX_ITERATIONS").unwrap_or(defaults.max_iterations),
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }
}

fn read_env(key: &str) -> Option<usize> {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<usize>().ok())
        .filter(|v| *v > 0)
}

#[test]
fn test_builder_overrides() {
    let options = ParserOptions::default().with_max_depth(3).with_max_iterations(10);
    assert_eq!(options.max_depth, 3);
    assert_eq!(options.max_iterations, 10);
}
