//! Compilation of structured label selectors into the textual selector grammar.

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, LabelSelectorRequirement};

use crate::error::{Error, Result};

/// Label selection input accepted by [`RequestBuilder::label_selector`](crate::request::RequestBuilder::label_selector).
#[derive(Debug, Clone, PartialEq)]
pub enum Selector {
    /// A clause already written in selector grammar, e.g. `k8s-app=kube-dns`.
    Expression(String),
    /// Flat equality mapping; clauses keep the insertion order.
    Equality(Vec<(String, String)>),
    /// `matchLabels` and `matchExpressions`.
    ///
    /// `matchLabels` is a `BTreeMap`, so its clauses come out sorted by key,
    /// not in the order they were written. Use [`Selector::Equality`] when
    /// clause order matters.
    LabelSelector(LabelSelector),
}

impl Selector {
    pub fn equality<I, K, V>(labels: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Selector::Equality(
            labels
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl From<&str> for Selector {
    fn from(expression: &str) -> Self {
        Selector::Expression(expression.to_string())
    }
}

impl From<String> for Selector {
    fn from(expression: String) -> Self {
        Selector::Expression(expression)
    }
}

impl From<BTreeMap<String, String>> for Selector {
    fn from(labels: BTreeMap<String, String>) -> Self {
        Selector::Equality(labels.into_iter().collect())
    }
}

impl From<LabelSelector> for Selector {
    fn from(selector: LabelSelector) -> Self {
        Selector::LabelSelector(selector)
    }
}

/// Compile a selector into its ordered list of clauses.
///
/// # Errors
/// Fails on an unknown `matchExpressions` operator, or on `In`/`NotIn`
/// without values.
pub fn compile(selector: &Selector) -> Result<Vec<String>> {
    match selector {
        Selector::Expression(expression) => Ok(vec![expression.clone()]),
        Selector::Equality(labels) => Ok(labels.iter().map(|(k, v)| equals(k, v)).collect()),
        Selector::LabelSelector(selector) => {
            let mut clauses: Vec<String> = selector
                .match_labels
                .iter()
                .flatten()
                .map(|(k, v)| equals(k, v))
                .collect();
            for requirement in selector.match_expressions.iter().flatten() {
                clauses.push(requirement_clause(requirement)?);
            }
            Ok(clauses)
        }
    }
}

fn equals(key: &str, value: &str) -> String {
    format!("{key} = {value}")
}

fn requirement_clause(requirement: &LabelSelectorRequirement) -> Result<String> {
    let key = &requirement.key;
    match requirement.operator.as_str() {
        op @ ("In" | "NotIn") => {
            let values = requirement
                .values
                .as_ref()
                .filter(|values| !values.is_empty())
                .ok_or_else(|| Error::MissingSelectorValues {
                    key: key.clone(),
                    operator: op.to_string(),
                })?;
            Ok(format!(
                "{key} {} ({})",
                op.to_ascii_lowercase(),
                values.join(",")
            ))
        }
        "Exists" => Ok(key.clone()),
        "DoesNotExist" => Ok(format!("!{key}")),
        other => Err(Error::UnknownSelectorOperator {
            key: key.clone(),
            operator: other.to_string(),
        }),
    }
}
