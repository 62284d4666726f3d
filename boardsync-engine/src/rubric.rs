//! Rubric score aggregation
//!
//! Pure computation over a proposal's evaluation steps. Totals sum the
//! numeric scores while averages divide by every answer, so an unscored
//! answer pulls the average down. A step or criterion without any scored
//! answer has no total and no average (absence, not zero).

use std::collections::{BTreeMap, HashMap};

use boardsync_common::models::{EvaluationStep, StepType};
use uuid::Uuid;

/// Aggregates of one evaluation step (or of every step sharing a title)
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StepScores {
    pub total: Option<f64>,
    pub average: Option<f64>,
    /// Distinct reviewers with at least one answer, in answer order
    pub evaluated_by: Vec<Uuid>,
}

/// Aggregates of every criterion sharing a title within one proposal
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CriteriaScores {
    pub total: Option<f64>,
    pub average: Option<f64>,
}

/// One reviewer's own score and comment for a criterion title
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReviewerEntry {
    pub reviewer_name: Option<String>,
    pub score: Option<f64>,
    pub comment: Option<String>,
}

/// Running sum over answers; `answers` counts unscored ones too
#[derive(Debug, Default)]
struct Sum {
    total: f64,
    answers: usize,
    scored: usize,
}

impl Sum {
    fn add(&mut self, score: Option<f64>) {
        self.answers += 1;
        if let Some(score) = score {
            self.total += score;
            self.scored += 1;
        }
    }

    fn total(&self) -> Option<f64> {
        (self.scored > 0).then_some(self.total)
    }

    fn average(&self) -> Option<f64> {
        (self.scored > 0).then(|| self.total / self.answers as f64)
    }
}

/// Aggregate the answers of the given steps as if they were one step
pub fn aggregate_step<'a>(steps: impl IntoIterator<Item = &'a EvaluationStep>) -> StepScores {
    let mut sum = Sum::default();
    let mut evaluated_by: Vec<Uuid> = Vec::new();

    for step in steps {
        for answer in &step.rubric_answers {
            sum.add(answer.score);
            if !evaluated_by.contains(&answer.reviewer_id) {
                evaluated_by.push(answer.reviewer_id);
            }
        }
    }

    StepScores {
        total: sum.total(),
        average: sum.average(),
        evaluated_by,
    }
}

/// Aggregates of rubric steps keyed by evaluation title
pub fn scores_by_step_title(evaluations: &[EvaluationStep]) -> BTreeMap<String, StepScores> {
    let mut by_title: BTreeMap<String, Vec<&EvaluationStep>> = BTreeMap::new();
    for step in rubric_steps(evaluations) {
        by_title.entry(step.title.clone()).or_default().push(step);
    }

    by_title
        .into_iter()
        .map(|(title, steps)| (title, aggregate_step(steps)))
        .collect()
}

fn rubric_steps(evaluations: &[EvaluationStep]) -> impl Iterator<Item = &EvaluationStep> {
    evaluations
        .iter()
        .filter(|step| step.evaluation_type == StepType::Rubric)
}

/// Criteria aggregates keyed by criteria title, across every rubric step
pub fn scores_by_criteria_title(evaluations: &[EvaluationStep]) -> BTreeMap<String, CriteriaScores> {
    let mut sums: BTreeMap<String, Sum> = BTreeMap::new();

    for step in rubric_steps(evaluations) {
        let titles: HashMap<Uuid, &str> = step
            .rubric_criteria
            .iter()
            .map(|c| (c.id, c.title.as_str()))
            .collect();

        for criteria in &step.rubric_criteria {
            sums.entry(criteria.title.clone()).or_default();
        }

        for answer in &step.rubric_answers {
            if let Some(title) = titles.get(&answer.criteria_id) {
                sums.entry(title.to_string()).or_default().add(answer.score);
            }
        }
    }

    sums.into_iter()
        .map(|(title, sum)| {
            (
                title,
                CriteriaScores {
                    total: sum.total(),
                    average: sum.average(),
                },
            )
        })
        .collect()
}

/// Individual answers keyed by (criteria title, reviewer), later steps win
pub fn reviewer_breakdown(evaluations: &[EvaluationStep]) -> BTreeMap<(String, Uuid), ReviewerEntry> {
    let mut entries = BTreeMap::new();

    for step in rubric_steps(evaluations) {
        for answer in &step.rubric_answers {
            let Some(criteria) = step.rubric_criteria.iter().find(|c| c.id == answer.criteria_id) else {
                continue;
            };
            entries.insert(
                (criteria.title.clone(), answer.reviewer_id),
                ReviewerEntry {
                    reviewer_name: answer.reviewer_name.clone(),
                    score: answer.score,
                    comment: answer.comment.clone(),
                },
            );
        }
    }

    entries
}
