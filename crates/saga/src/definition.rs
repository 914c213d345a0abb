//! Saga definitions: an ordered, doubly-traversable chain of steps.

use std::collections::HashMap;

use crate::error::{Result, SagaError};
use crate::step::Step;

/// A named saga: steps in action order, indexed by name.
///
/// Steps are stored in an arena and linked by position, so the chain has
/// no ownership cycles. Insertion order is the action order; compensation
/// walks it backwards.
#[derive(Debug, Clone)]
pub struct SagaDefinition {
    name: String,
    steps: Vec<Step>,
    index: HashMap<String, usize>,
}

impl SagaDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Appends a step after the current tail.
    pub fn add_step(&mut self, mut step: Step) -> Result<()> {
        if self.index.contains_key(step.name()) {
            return Err(SagaError::DuplicateStepName {
                saga_name: self.name.clone(),
                step_name: step.name().to_string(),
            });
        }

        let position = self.steps.len();
        step.position = position;
        step.previous = position.checked_sub(1);
        step.next = None;
        if let Some(tail) = self.steps.last_mut() {
            tail.next = Some(position);
        }

        self.index.insert(step.name().to_string(), position);
        self.steps.push(step);
        Ok(())
    }

    /// Builder form of [`add_step`](Self::add_step).
    pub fn with_step(mut self, step: Step) -> Result<Self> {
        self.add_step(step)?;
        Ok(self)
    }

    pub fn get_step(&self, name: &str) -> Result<&Step> {
        self.index
            .get(name)
            .and_then(|&position| self.steps.get(position))
            .ok_or_else(|| SagaError::StepNotFound {
                saga_name: self.name.clone(),
                step_name: name.to_string(),
            })
    }

    pub fn first_step(&self) -> Result<&Step> {
        self.steps
            .first()
            .ok_or_else(|| SagaError::EmptySaga(self.name.clone()))
    }

    pub fn last_step(&self) -> Result<&Step> {
        self.steps
            .last()
            .ok_or_else(|| SagaError::EmptySaga(self.name.clone()))
    }

    pub fn next_step(&self, step: &Step) -> Option<&Step> {
        step.next.and_then(|position| self.steps.get(position))
    }

    pub fn previous_step(&self, step: &Step) -> Option<&Step> {
        step.previous.and_then(|position| self.steps.get(position))
    }

    /// Steps in action order.
    pub fn steps(&self) -> impl DoubleEndedIterator<Item = &Step> {
        self.steps.iter()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::{StepInput, from_fn};

    fn step(name: &str) -> Step {
        Step::new(
            name,
            from_fn(|input: StepInput| async move { Ok(input.payload) }),
            from_fn(|input: StepInput| async move { Ok(input.payload) }),
        )
    }

    fn three_steps() -> SagaDefinition {
        SagaDefinition::new("saga")
            .with_step(step("step1"))
            .unwrap()
            .with_step(step("step2"))
            .unwrap()
            .with_step(step("step3"))
            .unwrap()
    }

    #[test]
    fn test_links_are_consistent_inverses() {
        let saga = three_steps();

        let names: Vec<_> = saga.steps().map(Step::name).collect();
        assert_eq!(names, ["step1", "step2", "step3"]);

        for step in saga.steps() {
            if let Some(next) = saga.next_step(step) {
                assert_eq!(saga.previous_step(next).unwrap().name(), step.name());
            }
            if let Some(previous) = saga.previous_step(step) {
                assert_eq!(saga.next_step(previous).unwrap().name(), step.name());
            }
        }

        assert_eq!(saga.steps().filter(|s| s.is_head()).count(), 1);
        assert_eq!(saga.steps().filter(|s| s.is_tail()).count(), 1);
    }

    #[test]
    fn test_head_and_tail() {
        let saga = three_steps();
        let first = saga.first_step().unwrap();
        let last = saga.last_step().unwrap();

        assert_eq!(first.name(), "step1");
        assert!(saga.previous_step(first).is_none());
        assert_eq!(last.name(), "step3");
        assert!(saga.next_step(last).is_none());
    }

    #[test]
    fn test_get_step_by_name() {
        let saga = three_steps();
        let step2 = saga.get_step("step2").unwrap();
        assert_eq!(step2.position(), 1);
        assert_eq!(saga.next_step(step2).unwrap().name(), "step3");
        assert_eq!(saga.previous_step(step2).unwrap().name(), "step1");
    }

    #[test]
    fn test_get_missing_step() {
        let saga = three_steps();
        let result = saga.get_step("step9");
        assert!(matches!(
            result,
            Err(SagaError::StepNotFound { ref step_name, .. }) if step_name == "step9"
        ));
    }

    #[test]
    fn test_duplicate_step_name_is_rejected() {
        let mut saga = three_steps();
        let result = saga.add_step(step("step2"));
        assert!(matches!(result, Err(SagaError::DuplicateStepName { .. })));
        assert_eq!(saga.len(), 3);
        assert!(saga.last_step().unwrap().is_tail());
    }

    #[test]
    fn test_empty_saga() {
        let saga = SagaDefinition::new("empty");
        assert!(saga.is_empty());
        assert!(matches!(saga.first_step(), Err(SagaError::EmptySaga(_))));
        assert!(matches!(saga.last_step(), Err(SagaError::EmptySaga(_))));
    }

    #[test]
    fn test_single_step_is_head_and_tail() {
        let saga = SagaDefinition::new("one").with_step(step("only")).unwrap();
        let only = saga.first_step().unwrap();
        assert!(only.is_head());
        assert!(only.is_tail());
        assert_eq!(saga.last_step().unwrap().name(), "only");
    }
}
