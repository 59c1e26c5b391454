use std::{collections::BTreeMap, time::Duration};

use serde_json::Value;

use crate::{
    backend::ApiResponse,
    domain::{Operation, OperationPolicy, Role},
    metric::{IterationMetric, OperationOutcome},
};

/// An observed status is acceptable when it is the expected one or one of
/// the whitelisted alternates. A missing status (transport failure) never is.
pub fn is_acceptable(observed: Option<u16>, expected: u16, alternates: &[u16]) -> bool {
    observed.is_some_and(|s| s == expected || alternates.contains(&s))
}

/// Per-iteration sink for classified outcomes and named counters.
///
/// Flows hold it by `&mut` for the length of one iteration; the collected
/// data then becomes an [`IterationMetric`]. Recording never fails.
#[derive(Debug)]
pub struct Recorder<'a> {
    policies: &'a BTreeMap<Operation, OperationPolicy>,
    outcomes: Vec<OperationOutcome>,
    events: Vec<String>,
}

impl<'a> Recorder<'a> {
    pub fn new(policies: &'a BTreeMap<Operation, OperationPolicy>) -> Self {
        Self {
            policies,
            outcomes: Vec::new(),
            events: Vec::new(),
        }
    }

    fn counted(&self, operation: Operation) -> bool {
        self.policies
            .get(&operation)
            .map_or(true, |policy| policy.counted)
    }

    /// Classifies an observed status against explicit expectations and
    /// records it. Returns whether the outcome was acceptable.
    pub fn record(
        &mut self,
        operation: Operation,
        observed: Option<u16>,
        expected: u16,
        alternates: &[u16],
        latency: Duration,
    ) -> bool {
        let accepted = is_acceptable(observed, expected, alternates);
        if !accepted {
            tracing::warn!("{operation} failed with status {observed:?}");
        }
        self.push(operation, observed, expected, alternates, latency, accepted);
        accepted
    }

    /// Classifies a response using the operation's configured policy.
    pub fn check(&mut self, operation: Operation, response: &ApiResponse) -> bool {
        let policy = self.policy(operation);
        let accepted = is_acceptable(response.status, policy.expected, &policy.acceptable);
        if !accepted {
            warn_unacceptable(operation, response);
        }
        self.push(
            operation,
            response.status,
            policy.expected,
            &policy.acceptable,
            response.latency,
            accepted,
        );
        accepted
    }

    /// Like [`Recorder::check`], but a response carrying the expected status
    /// must also have a JSON body satisfying `predicate`. Returns the parsed
    /// body only in that case.
    ///
    /// Whitelisted alternates are accepted without inspecting the body and
    /// yield `None`.
    pub fn check_json<F>(
        &mut self,
        operation: Operation,
        response: &ApiResponse,
        predicate: F,
    ) -> Option<Value>
    where
        F: FnOnce(&Value) -> bool,
    {
        let policy = self.policy(operation);
        let body = (response.status == Some(policy.expected))
            .then(|| response.json())
            .flatten()
            .filter(|body| predicate(body));

        let accepted = body.is_some()
            || (response.status != Some(policy.expected)
                && is_acceptable(response.status, policy.expected, &policy.acceptable));
        if !accepted {
            warn_unacceptable(operation, response);
        }
        self.push(
            operation,
            response.status,
            policy.expected,
            &policy.acceptable,
            response.latency,
            accepted,
        );
        body
    }

    /// Bumps a named counter, e.g. `transactions_created`.
    pub fn count(&mut self, event: impl Into<String>) {
        self.events.push(event.into());
    }

    pub fn outcomes(&self) -> &[OperationOutcome] {
        &self.outcomes
    }

    pub fn events(&self) -> &[String] {
        &self.events
    }

    pub fn finish(self, role: Role, duration: Duration) -> IterationMetric {
        IterationMetric {
            role,
            outcomes: self.outcomes,
            events: self.events,
            duration,
        }
    }

    fn policy(&self, operation: Operation) -> OperationPolicy {
        self.policies
            .get(&operation)
            .cloned()
            .unwrap_or_else(|| operation.default_policy())
    }

    fn push(
        &mut self,
        operation: Operation,
        status: Option<u16>,
        expected: u16,
        acceptable: &[u16],
        latency: Duration,
        accepted: bool,
    ) {
        let counted = self.counted(operation);
        self.outcomes.push(OperationOutcome {
            operation,
            status,
            expected,
            acceptable: acceptable.to_vec(),
            latency,
            accepted,
            counted,
        });
    }
}

fn warn_unacceptable(operation: Operation, response: &ApiResponse) {
    match response.status {
        Some(status) => tracing::warn!(
            "{operation} failed with status {status}: {}",
            response.excerpt()
        ),
        None => tracing::warn!("{operation} failed without a response: {}", response.excerpt()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(status: Option<u16>, body: &str) -> ApiResponse {
        ApiResponse {
            status,
            body: body.to_string(),
            latency: Duration::from_millis(12),
        }
    }

    fn defaults() -> BTreeMap<Operation, OperationPolicy> {
        Operation::ALL
            .iter()
            .map(|op| (*op, op.default_policy()))
            .collect()
    }

    #[test]
    fn acceptability_is_expected_or_alternate() {
        assert!(is_acceptable(Some(200), 200, &[]));
        assert!(is_acceptable(Some(404), 200, &[404]));
        assert!(!is_acceptable(Some(500), 200, &[404]));
        assert!(!is_acceptable(None, 200, &[404]));
    }

    #[test]
    fn whitelisted_not_found_is_not_an_error() {
        let policies = defaults();
        let mut recorder = Recorder::new(&policies);
        assert!(recorder.check(Operation::ProductDetail, &response(Some(404), "")));
        assert!(!recorder.check(Operation::ProductList, &response(Some(404), "")));
        let outcomes = recorder.outcomes();
        assert!(outcomes[0].accepted);
        assert!(!outcomes[1].accepted);
        // still a failed request at the transport level
        assert!(outcomes[0].is_failed_request());
    }

    #[test]
    fn check_json_needs_a_parseable_body() {
        let policies = defaults();
        let mut recorder = Recorder::new(&policies);

        let body = recorder.check_json(
            Operation::CartCalculate,
            &response(Some(200), r#"{"data":{"total_amount":12500}}"#),
            |v| v.get("data").is_some(),
        );
        assert_eq!(body, Some(json!({"data": {"total_amount": 12500}})));

        let garbage = recorder.check_json(
            Operation::CartCalculate,
            &response(Some(200), "<html>oops</html>"),
            |_| true,
        );
        assert_eq!(garbage, None);

        // 400 is whitelisted for the calculation: accepted but no body
        let rejected =
            recorder.check_json(Operation::CartCalculate, &response(Some(400), "{}"), |_| true);
        assert_eq!(rejected, None);

        let accepted: Vec<bool> = recorder.outcomes().iter().map(|o| o.accepted).collect();
        assert_eq!(accepted, vec![true, false, true]);
    }

    #[test]
    fn uncounted_policy_is_carried_into_outcomes() {
        let mut policies = defaults();
        policies.insert(
            Operation::Dashboard,
            OperationPolicy {
                expected: 200,
                acceptable: vec![],
                counted: false,
            },
        );
        let mut recorder = Recorder::new(&policies);
        recorder.check(Operation::Dashboard, &response(Some(503), "busy"));
        recorder.count("transactions_created");

        let metric = recorder.finish(Role::Manager, Duration::from_secs(1));
        assert!(!metric.outcomes[0].counted);
        assert_eq!(metric.events, vec!["transactions_created".to_string()]);
        assert_eq!(metric.role, Role::Manager);
    }

    #[test]
    fn explicit_record_ignores_policy_statuses() {
        let policies = BTreeMap::new();
        let mut recorder = Recorder::new(&policies);
        assert!(recorder.record(Operation::Checkout, Some(409), 201, &[409], Duration::ZERO));
        assert!(!recorder.record(Operation::Checkout, None, 201, &[], Duration::ZERO));
    }
}
