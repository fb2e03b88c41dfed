//! Multiple-choice question generation.
//!
//! A question asks for one field of the target fact. The three wrong options
//! are values of the same field taken from sibling facts of the domain.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::types::{Domain, Fact, FactId};

pub const DISTRACTOR_COUNT: usize = 3;
pub const OPTION_COUNT: usize = DISTRACTOR_COUNT + 1;

/// Smallest domain that can produce a question.
pub const MIN_DOMAIN_FACTS: usize = DISTRACTOR_COUNT + 1;

/// Another field of the same fact, shown so the learner knows what is asked
/// about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cue {
    pub field: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub fact_id: FactId,
    /// Field under test.
    pub field: String,
    pub cue: Option<Cue>,
    /// Exactly [`OPTION_COUNT`] distinct values.
    pub options: Vec<String>,
    pub correct_index: usize,
}

impl Question {
    pub fn correct_answer(&self) -> &str {
        &self.options[self.correct_index]
    }

    pub fn is_correct(&self, chosen_index: usize) -> bool {
        chosen_index == self.correct_index
    }
}

/// Fails with a configuration error when the domain cannot be practiced:
/// fewer than [`MIN_DOMAIN_FACTS`] facts, no fields, or no field with
/// [`OPTION_COUNT`] distinct values.
pub fn ensure_practicable(domain: &Domain, facts: &[Fact]) -> EngineResult<()> {
    if facts.len() < MIN_DOMAIN_FACTS {
        return Err(EngineError::Configuration(format!(
            "domain {} ({}) has {} facts, at least {} are required",
            domain.id,
            domain.name,
            facts.len(),
            MIN_DOMAIN_FACTS
        )));
    }
    if domain.fields.is_empty() {
        return Err(EngineError::Configuration(format!(
            "domain {} ({}) has no fields",
            domain.id, domain.name
        )));
    }
    let askable = domain.fields.iter().any(|field| {
        let mut values: Vec<&str> = facts.iter().filter_map(|f| f.value(field)).collect();
        values.sort_unstable();
        values.dedup();
        values.len() >= OPTION_COUNT
    });
    if !askable {
        return Err(EngineError::Configuration(format!(
            "domain {} ({}) has no field with {} distinct values",
            domain.id, domain.name, OPTION_COUNT
        )));
    }
    Ok(())
}

/// Distinct values of `field` among `siblings` that differ from `correct`.
fn wrong_values<'a>(siblings: &[&'a Fact], field: &str, correct: &str) -> Vec<&'a str> {
    let mut pool: Vec<&str> = Vec::new();
    for sibling in siblings {
        if let Some(value) = sibling.value(field) {
            if value != correct && !pool.contains(&value) {
                pool.push(value);
            }
        }
    }
    pool
}

/// Builds a question about `target`.
///
/// Only fields with at least [`DISTRACTOR_COUNT`] distinct wrong values are
/// asked. Among those, `previous_field` is avoided when another one
/// qualifies. No side effects; all randomness comes from `rng`.
pub fn build_question<R: Rng + ?Sized>(
    rng: &mut R,
    domain: &Domain,
    target: &Fact,
    domain_facts: &[Fact],
    previous_field: Option<&str>,
) -> EngineResult<Question> {
    let siblings: Vec<&Fact> = domain_facts.iter().filter(|f| f.id != target.id).collect();
    if siblings.len() + 1 < MIN_DOMAIN_FACTS {
        return Err(EngineError::Configuration(format!(
            "domain {} ({}) has {} facts, at least {} are required",
            domain.id,
            domain.name,
            siblings.len() + 1,
            MIN_DOMAIN_FACTS
        )));
    }

    let askable: Vec<(&str, &str, Vec<&str>)> = domain
        .fields
        .iter()
        .filter_map(|field| {
            let correct = target.value(field)?;
            let pool = wrong_values(&siblings, field, correct);
            (pool.len() >= DISTRACTOR_COUNT).then_some((field.as_str(), correct, pool))
        })
        .collect();
    if askable.is_empty() {
        return Err(EngineError::Configuration(format!(
            "no field of domain {} has {} distinct wrong values for fact {}",
            domain.id, DISTRACTOR_COUNT, target.id
        )));
    }

    let mut candidates: Vec<&(&str, &str, Vec<&str>)> = askable.iter().collect();
    if let Some(previous) = previous_field {
        if candidates.len() > 1 {
            candidates.retain(|(field, _, _)| *field != previous);
        }
    }
    let &(field, correct, ref pool) = candidates
        .choose(rng)
        .copied()
        .ok_or_else(|| EngineError::Configuration(format!("domain {} has no fields", domain.id)))?;

    let mut options: Vec<String> = Vec::with_capacity(OPTION_COUNT);
    options.push(correct.to_string());
    options.extend(
        pool.choose_multiple(rng, DISTRACTOR_COUNT)
            .map(|v| v.to_string()),
    );
    options.shuffle(rng);
    let correct_index = options
        .iter()
        .position(|o| o == correct)
        .ok_or_else(|| EngineError::Configuration("correct option lost in shuffle".to_string()))?;

    Ok(Question {
        fact_id: target.id,
        cue: cue_for(domain, target, field),
        field: field.to_string(),
        options,
        correct_index,
    })
}

fn cue_for(domain: &Domain, target: &Fact, asked: &str) -> Option<Cue> {
    let field = domain.fields.iter().find(|f| f.as_str() != asked)?;
    target.value(field).map(|value| Cue {
        field: field.clone(),
        value: value.to_string(),
    })
}
