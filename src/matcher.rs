//! Deciding whether a cashback rule pays out on a category code and payment method.

use serde::Serialize;

use crate::models::{MerchantRecord, MethodScope, PaymentMethod, Rule};

/// How a rule claimed a category code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MatchKind {
    /// The code is listed on the rule
    Specific,
    /// Default or code-less rule that does not exclude the code
    Broad,
}

/// The method a query is checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetMethod {
    Any,
    Only(PaymentMethod),
}

impl TargetMethod {
    /// Explicit choice first, then whatever the merchant was charged under before.
    pub fn resolve(explicit: Option<PaymentMethod>, from_history: Option<PaymentMethod>) -> Self {
        match explicit.or(from_history) {
            Some(method) => TargetMethod::Only(method),
            None => TargetMethod::Any,
        }
    }
}

/// Category codes are exactly four ASCII digits.
pub fn is_valid_category_code(code: &str) -> bool {
    code.len() == 4 && code.bytes().all(|b| b.is_ascii_digit())
}

fn lists(codes: &[String], code: &str) -> bool {
    codes.iter().any(|c| c.trim() == code)
}

pub fn match_category(rule: &Rule, code: &str) -> Option<MatchKind> {
    if !is_valid_category_code(code) {
        return None;
    }
    if lists(&rule.category_codes, code) {
        return Some(MatchKind::Specific);
    }
    let broad = rule.is_default || rule.category_codes.is_empty();
    (broad && !lists(&rule.excluded_codes, code)).then_some(MatchKind::Broad)
}

pub fn method_allows(rule: &Rule, target: TargetMethod) -> bool {
    match (&rule.methods, target) {
        (MethodScope::All, _) => true,
        (MethodScope::Only(methods), _) if methods.is_empty() => true,
        (MethodScope::Only(_), TargetMethod::Any) => true,
        (MethodScope::Only(methods), TargetMethod::Only(m)) => methods.contains(&m),
    }
}

/// Category and method tests combined. Rule status is not checked here.
pub fn matches(rule: &Rule, code: &str, target: TargetMethod) -> Option<MatchKind> {
    match_category(rule, code).filter(|_| method_allows(rule, target))
}

/// Looks a merchant up in history: exact name first (case-insensitive), then substring.
pub fn resolve_merchant<'a>(history: &'a [MerchantRecord], text: &str) -> Option<&'a MerchantRecord> {
    let needle = text.trim().to_lowercase();
    if needle.is_empty() {
        return None;
    }
    history
        .iter()
        .find(|r| r.merchant.to_lowercase() == needle)
        .or_else(|| history.iter().find(|r| r.merchant.to_lowercase().contains(&needle)))
}
