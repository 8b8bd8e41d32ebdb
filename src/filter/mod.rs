//! Filter Engine - per-account rule scripts deciding which repositories are mirrored
//!
//! Every account may carry an ordered list of small rule scripts written in a
//! Tengo-like expression language. Each script sees the repository through
//! read-only bindings and must bind a boolean `r`:
//!
//! ```text
//! r := !owner || size > 600
//! ```
//!
//! A repository is accepted when every rule yields `true`. Rules run in order
//! and evaluation stops at the first rule yielding `false`. A rule that fails
//! at runtime rejects the repository.
//!
//! | binding      | type   | meaning                                   |
//! |--------------|--------|-------------------------------------------|
//! | `owner`      | bool   | authenticated account owns the repository |
//! | `member`     | bool   | authenticated account is a member         |
//! | `visibility` | int    | 0 public, 1 private, 2 internal           |
//! | `size`       | int    | provider-reported size, -1 when unknown   |
//! | `name`       | string | catalog name, e.g. `group/project`        |
//! | `archived`   | bool   | repository is archived                    |

mod eval;
mod lexer;
mod parser;

use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, warn};

use crate::repository::Repository;
use eval::{Env, Value};

/// Name every rule must bind its verdict to
pub const RESULT_NAME: &str = "r";

/// Errors raised while compiling or running a rule
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("syntax error at {line}:{col}: {message}")]
    Syntax {
        line: usize,
        col: usize,
        message: String,
    },

    #[error("type error: {0}")]
    Type(String),

    #[error("unknown identifier '{0}'")]
    UnknownIdentifier(String),

    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    #[error("cannot assign to read-only binding '{0}'")]
    ReadOnly(String),

    #[error("'{0}' redeclared in this block")]
    Redeclared(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("integer overflow")]
    Overflow,

    #[error("invalid regular expression: {0}")]
    Regex(String),

    #[error("rule did not bind 'r'")]
    MissingResult,

    #[error("rule result 'r' must be bool, got {0}")]
    NonBoolResult(String),
}

/// A single compiled rule script
#[derive(Debug, Clone)]
pub struct Rule {
    source: String,
    program: Vec<parser::Stmt>,
}

impl Rule {
    /// Compile a rule from its source text
    pub fn compile(source: &str) -> Result<Self, FilterError> {
        let tokens = lexer::tokenize(source)?;
        let program = parser::parse(tokens)?;
        Ok(Self {
            source: source.to_string(),
            program,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Run the rule against a repository and return its verdict
    pub fn evaluate(&self, repo: &Repository) -> Result<bool, FilterError> {
        let mut env = Env::new(bindings(repo));
        eval::run(&self.program, &mut env)?;

        match env.global(RESULT_NAME) {
            Some(Value::Bool(verdict)) => Ok(*verdict),
            Some(other) => Err(FilterError::NonBoolResult(format!(
                "{} {}",
                other.type_name(),
                other
            ))),
            None => Err(FilterError::MissingResult),
        }
    }
}

/// Read-only values injected into every rule run
fn bindings(repo: &Repository) -> HashMap<&'static str, Value> {
    HashMap::from([
        ("owner", Value::Bool(repo.owner)),
        ("member", Value::Bool(repo.member)),
        ("visibility", Value::Int(repo.visibility as i64)),
        ("size", Value::Int(repo.size)),
        ("name", Value::Str(repo.name.clone())),
        ("archived", Value::Bool(repo.archived)),
    ])
}

/// Outcome of running a chain against one repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    /// Rule at this index yielded `false`
    Rejected { rule: usize },
    /// Rule at this index failed to run
    Failed { rule: usize, error: FilterError },
}

/// Ordered, AND-combined list of rules installed on a provider
#[derive(Debug, Clone, Default)]
pub struct FilterChain {
    rules: Vec<Rule>,
}

impl FilterChain {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Run the rules in order, stopping at the first one that does not pass
    pub fn evaluate(&self, repo: &Repository) -> Verdict {
        for (index, rule) in self.rules.iter().enumerate() {
            match rule.evaluate(repo) {
                Ok(true) => continue,
                Ok(false) => return Verdict::Rejected { rule: index },
                Err(error) => return Verdict::Failed { rule: index, error },
            }
        }
        Verdict::Accepted
    }

    /// Whether the repository passes the chain
    ///
    /// A rule that fails to run rejects the repository and is returned as the error.
    pub fn check(&self, repo: &Repository) -> Result<bool, FilterFailure> {
        match self.evaluate(repo) {
            Verdict::Accepted => Ok(true),
            Verdict::Rejected { rule } => {
                debug!("{} was filtered due to filter[{}]", repo.name, rule);
                Ok(false)
            }
            Verdict::Failed { rule, error } => Err(FilterFailure {
                repository: repo.name.clone(),
                rule,
                script: self.rules[rule].source().to_string(),
                error,
            }),
        }
    }

    /// Whether the repository passes the chain; failures count as rejection
    pub fn accepts(&self, repo: &Repository) -> bool {
        self.check(repo).unwrap_or_else(|failure| {
            warn!("{}", failure);
            false
        })
    }
}

/// A rule that could not run against a repository
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Failed to apply filter[{rule}] `{script}` for {repository}: {error}")]
pub struct FilterFailure {
    pub repository: String,
    pub rule: usize,
    pub script: String,
    pub error: FilterError,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::Visibility;
    use chrono::{DateTime, Utc};

    fn repo(name: &str, size: i64, owner: bool, member: bool, visibility: Visibility) -> Repository {
        Repository {
            clone_url: String::new(),
            name: name.to_string(),
            size,
            created_at: DateTime::<Utc>::default(),
            owner,
            member,
            visibility,
            provider_name: "test".to_string(),
            archived: false,
        }
    }

    fn fixtures() -> Vec<Repository> {
        vec![
            repo("owner", 500, true, true, Visibility::Public),
            repo("member", 1200, false, true, Visibility::Public),
            repo("private", 400, true, true, Visibility::Private),
            repo("test", 1200, true, true, Visibility::Public),
            repo("garbage", -1, false, false, Visibility::Internal),
        ]
    }

    fn chain(sources: &[&str]) -> FilterChain {
        FilterChain::new(
            sources
                .iter()
                .map(|s| Rule::compile(s).expect("rule compiles"))
                .collect(),
        )
    }

    #[test]
    fn test_rule_table() {
        let cases: [(&str, &str, [bool; 5]); 5] = [
            ("ignore all I don't own", "r := !owner", [false, true, false, false, true]),
            ("members", "r := !member", [false, false, false, false, true]),
            ("small and owned", "r := !owner || size > 600", [false, true, false, true, true]),
            ("expect all to be false", "r := false", [false, false, false, false, false]),
            ("public only", "r := visibility == 0", [true, true, false, true, false]),
        ];

        for (desc, source, expected) in cases {
            let rule = Rule::compile(source).unwrap();
            for (repo, want) in fixtures().iter().zip(expected) {
                assert_eq!(
                    rule.evaluate(repo).unwrap(),
                    want,
                    "{} for {}",
                    desc,
                    repo.name
                );
            }
        }
    }

    #[test]
    fn test_empty_chain_accepts() {
        let empty = FilterChain::default();
        assert!(empty.is_empty());
        for repo in fixtures() {
            assert!(empty.accepts(&repo));
        }
    }

    #[test]
    fn test_chain_is_conjunction() {
        let garbage = repo("garbage", -1, false, false, Visibility::Internal);
        let both = chain(&["r := !owner", "r := !member"]);
        assert_eq!(both.evaluate(&garbage), Verdict::Accepted);

        let member = repo("member", 1200, false, true, Visibility::Public);
        assert_eq!(both.evaluate(&member), Verdict::Rejected { rule: 1 });
    }

    #[test]
    fn test_chain_stops_at_first_false() {
        let owned = repo("owner", 500, true, true, Visibility::Public);
        let rules = chain(&["r := !owner", "r := size / 0 > 1"]);
        assert_eq!(rules.evaluate(&owned), Verdict::Rejected { rule: 0 });
    }

    #[test]
    fn test_runtime_failure_rejects() {
        let owned = repo("owner", 500, true, true, Visibility::Public);
        let rules = chain(&["r := size / 0 > 1"]);
        assert_eq!(
            rules.evaluate(&owned),
            Verdict::Failed {
                rule: 0,
                error: FilterError::DivisionByZero
            }
        );
        assert!(!rules.accepts(&owned));

        let failure = rules.check(&owned).unwrap_err();
        assert_eq!(failure.rule, 0);
        assert_eq!(
            failure.to_string(),
            "Failed to apply filter[0] `r := size / 0 > 1` for owner: division by zero"
        );
    }

    #[test]
    fn test_result_contract() {
        let owned = repo("owner", 500, true, true, Visibility::Public);
        assert_eq!(
            Rule::compile("x := owner").unwrap().evaluate(&owned),
            Err(FilterError::MissingResult)
        );
        assert_eq!(
            Rule::compile("r := size").unwrap().evaluate(&owned),
            Err(FilterError::NonBoolResult("int 500".into()))
        );
    }

    #[test]
    fn test_archived_and_name_bindings() {
        let mut archived = repo("group/legacy-tool", 10, true, true, Visibility::Private);
        archived.archived = true;
        let rules = chain(&["r := !archived", "r := !starts_with(name, \"group/\")"]);
        assert_eq!(rules.evaluate(&archived), Verdict::Rejected { rule: 0 });
    }

    #[test]
    fn test_compile_rejects_bad_syntax() {
        assert!(matches!(
            Rule::compile("r := owner &&"),
            Err(FilterError::Syntax { .. })
        ));
    }
}
