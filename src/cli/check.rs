//! Test a query's conditions against JSON records

use serde_json::Value;

use super::CliError;
use crate::{Registry, SearchQuery};

/// Options for the test command
#[derive(Debug, Clone, Default)]
pub struct TestOptions {
    /// Query string, or a bare condition list when `conditions` is set
    pub query: String,
    /// JSON record, or an array of records
    pub input: Option<String>,
    pub conditions: bool,
}

/// Evaluate the query's `WHERE` condition against every input record.
pub fn execute_test(options: &TestOptions, registry: &Registry) -> Result<Vec<bool>, CliError> {
    let query = if options.conditions {
        SearchQuery::from_conditions_string(&options.query, registry)?
    } else {
        SearchQuery::from_query_string(&options.query, registry)?
    };

    let input = options.input.as_ref().ok_or(CliError::NoInput)?;
    let records = match serde_json::from_str(input)? {
        Value::Array(records) => records,
        record => vec![record],
    };

    records
        .iter()
        .map(|record| query.test(record).map_err(CliError::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_input_tests_each_record() {
        let options = TestOptions {
            query: "status = 'open'".to_string(),
            input: Some(r#"[{"status": "open"}, {"status": "closed"}]"#.to_string()),
            conditions: true,
        };
        assert_eq!(execute_test(&options, &Registry::new()).unwrap(), vec![true, false]);
    }

    #[test]
    fn missing_input() {
        let options = TestOptions {
            query: "WHERE a = 1".to_string(),
            ..Default::default()
        };
        assert!(matches!(execute_test(&options, &Registry::new()), Err(CliError::NoInput)));
    }
}
