//! Model validation.
//!
//! Validation reports problems as [`ValidationIssue`] values for the form or
//! command that produced them; it never fails or panics. Structural errors
//! (unknown ids) are the store's business, see [`crate::error::ModelError`].

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

use crate::equation::{KNOWN_FUNCTIONS, Token, TokenKind, is_valid_symbol_name, tokenize};
use crate::model::{Id, Model};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "issue", rename_all = "camelCase")]
pub enum ValidationIssue {
    DuplicateName { name: String, ids: Vec<Id> },
    InvalidName { id: Id, name: String },
    NegativeInitialValue { id: Id, value: f64 },
    UnknownEndpoint { flow: Id, endpoint: Id },
    EmptyEquation { flow: Id },
    UnbalancedParentheses { flow: Id },
    /// The equation does not parse; `position` is a byte offset.
    MalformedEquation { flow: Id, position: usize },
    UnknownSymbol { flow: Id, symbol: String },
    UnknownFunction { flow: Id, function: String },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::DuplicateName { name, ids } => {
                let ids: Vec<&str> = ids.iter().map(Id::as_str).collect();
                write!(f, "name '{}' is used by {}", name, ids.join(", "))
            }
            ValidationIssue::InvalidName { id, name } => {
                write!(f, "'{}' ({}) is not a valid symbol name", name, id)
            }
            ValidationIssue::NegativeInitialValue { id, value } => {
                write!(f, "compartment {} has negative initial value {}", id, value)
            }
            ValidationIssue::UnknownEndpoint { flow, endpoint } => {
                write!(f, "flow {} connects unknown compartment {}", flow, endpoint)
            }
            ValidationIssue::EmptyEquation { flow } => write!(f, "flow {} has no equation", flow),
            ValidationIssue::UnbalancedParentheses { flow } => {
                write!(f, "flow {} has unbalanced parentheses", flow)
            }
            ValidationIssue::MalformedEquation { flow, position } => {
                write!(f, "flow {} equation is malformed at offset {}", flow, position)
            }
            ValidationIssue::UnknownSymbol { flow, symbol } => {
                write!(f, "flow {} references unknown symbol '{}'", flow, symbol)
            }
            ValidationIssue::UnknownFunction { flow, function } => {
                write!(f, "flow {} calls unknown function '{}'", flow, function)
            }
        }
    }
}

/// Check a whole model. An empty result means the model is valid.
pub fn validate_model(model: &Model) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    check_names(model, &mut issues);

    for c in &model.compartments {
        if c.value < 0.0 {
            issues.push(ValidationIssue::NegativeInitialValue {
                id: c.id.clone(),
                value: c.value,
            });
        }
    }

    let symbols = model.symbols();
    for flow in &model.flows {
        for endpoint in [&flow.source, &flow.target] {
            if model.compartment(endpoint).is_none() {
                issues.push(ValidationIssue::UnknownEndpoint {
                    flow: flow.id.clone(),
                    endpoint: endpoint.clone(),
                });
            }
        }
        issues.extend(validate_equation(&flow.id, &flow.equation, &symbols));
    }
    issues
}

fn check_names(model: &Model, issues: &mut Vec<ValidationIssue>) {
    let named = model
        .compartments
        .iter()
        .map(|c| (&c.id, &c.name))
        .chain(model.constants.iter().map(|c| (&c.id, &c.name)))
        .chain(model.interventions.iter().map(|i| (&i.id, &i.name)));

    let mut by_name: Vec<(&String, Vec<Id>)> = Vec::new();
    let mut index: HashMap<&String, usize> = HashMap::new();
    for (id, name) in named {
        if !is_valid_symbol_name(name) {
            issues.push(ValidationIssue::InvalidName {
                id: id.clone(),
                name: name.clone(),
            });
        }
        match index.get(name) {
            Some(&i) => by_name[i].1.push(id.clone()),
            None => {
                index.insert(name, by_name.len());
                by_name.push((name, vec![id.clone()]));
            }
        }
    }
    for (name, ids) in by_name {
        if ids.len() > 1 {
            issues.push(ValidationIssue::DuplicateName {
                name: name.clone(),
                ids,
            });
        }
    }
}

/// Check that `name` can be given to the entity `owner` (or to a new entity
/// when `owner` is `None`) without clashing with another symbol.
pub fn check_name_available(
    model: &Model,
    name: &str,
    owner: Option<&Id>,
) -> Result<(), ValidationIssue> {
    let id = owner.cloned().unwrap_or_else(|| Id::new(""));
    if !is_valid_symbol_name(name) {
        return Err(ValidationIssue::InvalidName {
            id,
            name: name.to_string(),
        });
    }
    match model.symbol_owner(name) {
        Some((_, existing)) if Some(existing) != owner => Err(ValidationIssue::DuplicateName {
            name: name.to_string(),
            ids: vec![existing.clone(), id],
        }),
        _ => Ok(()),
    }
}

/// Check one equation's syntax and symbol references against `symbols`.
pub fn validate_equation(flow: &Id, equation: &str, symbols: &[String]) -> Vec<ValidationIssue> {
    let tokens = tokenize(equation);
    if tokens.is_empty() {
        return vec![ValidationIssue::EmptyEquation { flow: flow.clone() }];
    }

    let mut depth: i64 = 0;
    for tok in &tokens {
        match tok.kind {
            TokenKind::OpenParen => depth += 1,
            TokenKind::CloseParen => depth -= 1,
            _ => {}
        }
        if depth < 0 {
            break;
        }
    }
    if depth != 0 {
        return vec![ValidationIssue::UnbalancedParentheses { flow: flow.clone() }];
    }

    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        end: equation.len(),
        depth: 0,
    };
    if let Err(position) = parser.expression().and_then(|()| parser.finish()) {
        return vec![ValidationIssue::MalformedEquation {
            flow: flow.clone(),
            position,
        }];
    }

    let mut issues = Vec::new();
    let mut reported: Vec<&str> = Vec::new();
    for (i, tok) in tokens.iter().enumerate() {
        if tok.kind != TokenKind::Identifier || reported.contains(&tok.text) {
            continue;
        }
        let is_call = tokens
            .get(i + 1)
            .is_some_and(|t| t.kind == TokenKind::OpenParen);
        if is_call {
            if !KNOWN_FUNCTIONS.contains(&tok.text) {
                issues.push(ValidationIssue::UnknownFunction {
                    flow: flow.clone(),
                    function: tok.text.to_string(),
                });
                reported.push(tok.text);
            }
        } else if !symbols.iter().any(|s| s == tok.text) {
            issues.push(ValidationIssue::UnknownSymbol {
                flow: flow.clone(),
                symbol: tok.text.to_string(),
            });
            reported.push(tok.text);
        }
    }
    issues
}

/// Recursive-descent recogniser for the equation grammar:
///
/// ```text
/// expr    := term (('+' | '-') term)*
/// term    := power (('*' | '/') power)*
/// power   := unary ('^' power)?
/// unary   := ('+' | '-') unary | primary
/// primary := NUMBER | IDENT | IDENT '(' args ')' | '(' expr ')'
/// args    := expr (',' expr)*
/// ```
///
/// Errors carry the byte offset of the offending token. Nesting deeper than
/// [`MAX_NESTING`] is reported as malformed.
struct Parser<'t, 'a> {
    tokens: &'t [Token<'a>],
    pos: usize,
    end: usize,
    depth: usize,
}

const MAX_NESTING: usize = 256;

impl Parser<'_, '_> {
    fn peek(&self) -> Option<&Token<'_>> {
        self.tokens.get(self.pos)
    }

    fn offset(&self) -> usize {
        self.peek().map_or(self.end, |t| t.start)
    }

    fn eat_operator(&mut self, ops: &[&str]) -> bool {
        match self.peek() {
            Some(t) if t.kind == TokenKind::Operator && ops.contains(&t.text) => {
                self.pos += 1;
                true
            }
            _ => false,
        }
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.peek().is_some_and(|t| t.kind == kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn nested(&mut self, rule: fn(&mut Self) -> Result<(), usize>) -> Result<(), usize> {
        if self.depth >= MAX_NESTING {
            return Err(self.offset());
        }
        self.depth += 1;
        let result = rule(self);
        self.depth -= 1;
        result
    }

    fn finish(&self) -> Result<(), usize> {
        if self.pos == self.tokens.len() {
            Ok(())
        } else {
            Err(self.offset())
        }
    }

    fn expression(&mut self) -> Result<(), usize> {
        self.term()?;
        while self.eat_operator(&["+", "-"]) {
            self.term()?;
        }
        Ok(())
    }

    fn term(&mut self) -> Result<(), usize> {
        self.power()?;
        while self.eat_operator(&["*", "/"]) {
            self.power()?;
        }
        Ok(())
    }

    fn power(&mut self) -> Result<(), usize> {
        self.unary()?;
        if self.eat_operator(&["^"]) {
            self.nested(Self::power)?;
        }
        Ok(())
    }

    fn unary(&mut self) -> Result<(), usize> {
        if self.eat_operator(&["+", "-"]) {
            return self.nested(Self::unary);
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<(), usize> {
        let Some(kind) = self.peek().map(|t| t.kind) else {
            return Err(self.end);
        };
        match kind {
            TokenKind::Number => {
                self.pos += 1;
                Ok(())
            }
            TokenKind::Identifier => {
                self.pos += 1;
                if self.eat(TokenKind::OpenParen) {
                    self.nested(Self::expression)?;
                    while self.eat(TokenKind::Comma) {
                        self.nested(Self::expression)?;
                    }
                    if !self.eat(TokenKind::CloseParen) {
                        return Err(self.offset());
                    }
                }
                Ok(())
            }
            TokenKind::OpenParen => {
                self.pos += 1;
                self.nested(Self::expression)?;
                if self.eat(TokenKind::CloseParen) {
                    Ok(())
                } else {
                    Err(self.offset())
                }
            }
            _ => Err(self.offset()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Compartment, Constant, Flow, Intervention};

    fn symbols() -> Vec<String> {
        ["S", "I", "beta", "u"].iter().map(|s| s.to_string()).collect()
    }

    fn check(eq: &str) -> Vec<ValidationIssue> {
        validate_equation(&Id::from("f1"), eq, &symbols())
    }

    #[test]
    fn test_valid_equations() {
        assert!(check("beta*S*I").is_empty());
        assert!(check("-beta * S * I * (1 - u)").is_empty());
        assert!(check("exp(-beta) + max(S, I)^2").is_empty());
        assert!(check("1.5e-3*S").is_empty());
    }

    #[test]
    fn test_syntax_errors() {
        assert_eq!(check("  "), vec![ValidationIssue::EmptyEquation { flow: Id::from("f1") }]);
        assert_eq!(
            check("(beta*S"),
            vec![ValidationIssue::UnbalancedParentheses { flow: Id::from("f1") }]
        );
        assert_eq!(
            check("beta**S"),
            vec![ValidationIssue::MalformedEquation {
                flow: Id::from("f1"),
                position: 5
            }]
        );
        assert_eq!(
            check("beta S"),
            vec![ValidationIssue::MalformedEquation {
                flow: Id::from("f1"),
                position: 5
            }]
        );
        assert!(matches!(
            check("beta*").as_slice(),
            [ValidationIssue::MalformedEquation { position: 5, .. }]
        ));
        assert!(matches!(
            check("S $ I").as_slice(),
            [ValidationIssue::MalformedEquation { position: 2, .. }]
        ));
    }

    #[test]
    fn test_deep_nesting_is_rejected_not_overflowed() {
        let shallow = format!("{}S{}", "(".repeat(100), ")".repeat(100));
        assert!(check(&shallow).is_empty());

        let deep = format!("{}S{}", "(".repeat(50_000), ")".repeat(50_000));
        assert!(matches!(
            check(&deep).as_slice(),
            [ValidationIssue::MalformedEquation { position: 257, .. }]
        ));

        let signs = format!("{}S", "-".repeat(50_000));
        assert!(matches!(
            check(&signs).as_slice(),
            [ValidationIssue::MalformedEquation { .. }]
        ));
        let powers = vec!["S"; 50_000].join("^");
        assert!(matches!(
            check(&powers).as_slice(),
            [ValidationIssue::MalformedEquation { .. }]
        ));
    }

    #[test]
    fn test_unknown_symbols_and_functions() {
        let issues = check("gamma*I + gamma + foo(S)");
        assert_eq!(
            issues,
            vec![
                ValidationIssue::UnknownSymbol {
                    flow: Id::from("f1"),
                    symbol: "gamma".into()
                },
                ValidationIssue::UnknownFunction {
                    flow: Id::from("f1"),
                    function: "foo".into()
                },
            ]
        );
        assert!(matches!(
            check("__removed__*S").as_slice(),
            [ValidationIssue::UnknownSymbol { .. }]
        ));
    }

    #[test]
    fn test_validate_model_collects_everything() {
        let model = Model {
            compartments: vec![
                Compartment::new("1", "S", 99.0),
                Compartment::new("2", "I", -1.0),
            ],
            constants: vec![Constant::new("3", "S", 0.3), Constant::new("4", "2x", 1.0)],
            interventions: vec![Intervention::new("5", "u")],
            flows: vec![Flow::new("f1", "1", "9", "S*I*u")],
        };
        let issues = validate_model(&model);
        assert!(issues.contains(&ValidationIssue::DuplicateName {
            name: "S".into(),
            ids: vec![Id::from("1"), Id::from("3")]
        }));
        assert!(issues.contains(&ValidationIssue::InvalidName {
            id: Id::from("4"),
            name: "2x".into()
        }));
        assert!(issues.contains(&ValidationIssue::NegativeInitialValue {
            id: Id::from("2"),
            value: -1.0
        }));
        assert!(issues.contains(&ValidationIssue::UnknownEndpoint {
            flow: Id::from("f1"),
            endpoint: Id::from("9")
        }));
        assert_eq!(issues.len(), 4);
    }

    #[test]
    fn test_check_name_available() {
        let model = Model {
            compartments: vec![Compartment::new("1", "S", 99.0)],
            constants: vec![Constant::new("2", "beta", 0.3)],
            ..Default::default()
        };
        assert!(check_name_available(&model, "gamma", None).is_ok());
        assert!(check_name_available(&model, "S", Some(&Id::from("1"))).is_ok());
        assert!(matches!(
            check_name_available(&model, "beta", Some(&Id::from("1"))),
            Err(ValidationIssue::DuplicateName { .. })
        ));
        assert!(matches!(
            check_name_available(&model, "1st", None),
            Err(ValidationIssue::InvalidName { .. })
        ));
    }
}
