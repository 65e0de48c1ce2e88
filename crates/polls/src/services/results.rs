//! Aggregation of votes into per-poll results.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::entities::{
    AnswerValue, Poll, PollContent, Preference, ProposedSlot, QuestionKind, Vote, VotePayload,
};

/// Aggregated results for a poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultsSummary {
    pub total_responses: u64,
    pub results: PollResults,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PollResults {
    Date { dates: Vec<DateTally> },
    Form { questions: Vec<QuestionResults> },
    Availability { slots: Vec<SlotTally> },
    Quizz(QuizzResults),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateTally {
    pub date: String,
    pub yes: u64,
    pub maybe: u64,
    pub no: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotTally {
    pub slot: ProposedSlot,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionTally {
    pub option_id: String,
    pub label: String,
    pub count: u64,
    pub percentage: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionResults {
    pub question_id: String,
    pub title: String,
    pub kind: String,
    /// Votes that answered this question
    pub responses: u64,
    pub options: Vec<OptionTally>,
    pub average: Option<f64>,
    pub text_answers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizzQuestionResults {
    pub question_id: String,
    pub title: String,
    pub correct: u64,
    pub answered: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizzResults {
    pub questions: Vec<QuizzQuestionResults>,
    pub average_score: f64,
    pub max_score: u32,
}

/// Integer percentages that always add up to 100 when `counts` is not all
/// zero, using the largest-remainder method. Ties go to the earlier entry.
pub fn largest_remainder_percentages(counts: &[u64]) -> Vec<u32> {
    let total: u64 = counts.iter().sum();
    if total == 0 {
        return vec![0; counts.len()];
    }

    let mut floors: Vec<u32> = Vec::with_capacity(counts.len());
    let mut remainders: Vec<(usize, u64)> = Vec::with_capacity(counts.len());
    for (idx, count) in counts.iter().enumerate() {
        let scaled = count * 100;
        floors.push((scaled / total) as u32);
        remainders.push((idx, scaled % total));
    }

    let assigned: u32 = floors.iter().sum();
    let missing = 100u32.saturating_sub(assigned) as usize;
    remainders.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    for (idx, _) in remainders.into_iter().take(missing) {
        floors[idx] += 1;
    }
    floors
}

fn rounded_share(count: u64, total: u64) -> u32 {
    if total == 0 {
        0
    } else {
        ((count as f64 * 100.0) / total as f64).round() as u32
    }
}

pub fn aggregate(poll: &Poll, votes: &[Vote]) -> ResultsSummary {
    let matching: Vec<&Vote> = votes
        .iter()
        .filter(|v| v.poll_id == poll.id && v.payload.poll_type() == poll.poll_type())
        .collect();

    let results = match &poll.content {
        PollContent::Date(content) => {
            let dates = content
                .dates
                .iter()
                .map(|date| {
                    let mut tally = DateTally {
                        date: date.clone(),
                        yes: 0,
                        maybe: 0,
                        no: 0,
                    };
                    for vote in &matching {
                        if let VotePayload::Date { selections } = &vote.payload {
                            match selections.get(date) {
                                Some(Preference::Yes) => tally.yes += 1,
                                Some(Preference::Maybe) => tally.maybe += 1,
                                Some(Preference::No) => tally.no += 1,
                                None => {}
                            }
                        }
                    }
                    tally
                })
                .collect();
            PollResults::Date { dates }
        }
        PollContent::Form(content) => PollResults::Form {
            questions: content
                .questions
                .iter()
                .map(|question| {
                    let answers: Vec<&AnswerValue> = matching
                        .iter()
                        .filter_map(|vote| match &vote.payload {
                            VotePayload::Form { answers } => answers.get(&question.id),
                            _ => None,
                        })
                        .collect();
                    question_results(&question.id, &question.title, &question.kind, &answers)
                })
                .collect(),
        },
        PollContent::Availability(content) => PollResults::Availability {
            slots: content
                .proposed_slots
                .iter()
                .map(|slot| SlotTally {
                    slot: slot.clone(),
                    count: matching
                        .iter()
                        .filter(|vote| match &vote.payload {
                            VotePayload::Availability { slots } => slots.contains(slot),
                            _ => false,
                        })
                        .count() as u64,
                })
                .collect(),
        },
        PollContent::Quizz(content) => {
            let max_score = content.questions.iter().map(|q| q.points).sum();
            let mut total_score = 0u64;
            let mut questions: Vec<QuizzQuestionResults> = content
                .questions
                .iter()
                .map(|q| QuizzQuestionResults {
                    question_id: q.id.clone(),
                    title: q.title.clone(),
                    correct: 0,
                    answered: 0,
                })
                .collect();

            for vote in &matching {
                let VotePayload::Quizz { answers } = &vote.payload else {
                    continue;
                };
                for (question, tally) in content.questions.iter().zip(questions.iter_mut()) {
                    let Some(given) = answers.get(&question.id) else {
                        continue;
                    };
                    tally.answered += 1;
                    let mut given = given.clone();
                    let mut expected = question.correct_option_ids.clone();
                    given.sort();
                    expected.sort();
                    if given == expected {
                        tally.correct += 1;
                        total_score += u64::from(question.points);
                    }
                }
            }

            let average_score = if matching.is_empty() {
                0.0
            } else {
                total_score as f64 / matching.len() as f64
            };
            PollResults::Quizz(QuizzResults {
                questions,
                average_score,
                max_score,
            })
        }
    };

    ResultsSummary {
        total_responses: matching.len() as u64,
        results,
    }
}

fn question_results(
    id: &str,
    title: &str,
    kind: &QuestionKind,
    answers: &[&AnswerValue],
) -> QuestionResults {
    let responses = answers.len() as u64;
    let mut results = QuestionResults {
        question_id: id.to_string(),
        title: title.to_string(),
        kind: kind.label().to_string(),
        responses,
        options: Vec::new(),
        average: None,
        text_answers: Vec::new(),
    };

    match kind {
        QuestionKind::SingleChoice { options } | QuestionKind::MultipleChoice { options, .. } => {
            let mut counts: HashMap<&str, u64> = HashMap::new();
            for answer in answers {
                match answer {
                    AnswerValue::Choice(choice) => *counts.entry(choice.as_str()).or_default() += 1,
                    AnswerValue::Choices(choices) => {
                        for choice in choices {
                            *counts.entry(choice.as_str()).or_default() += 1;
                        }
                    }
                    _ => {}
                }
            }
            let ordered: Vec<u64> = options
                .iter()
                .map(|o| counts.get(o.id.as_str()).copied().unwrap_or_default())
                .collect();
            let percentages = if matches!(kind, QuestionKind::SingleChoice { .. }) {
                largest_remainder_percentages(&ordered)
            } else {
                ordered.iter().map(|c| rounded_share(*c, responses)).collect()
            };
            results.options = options
                .iter()
                .zip(ordered.iter().zip(percentages))
                .map(|(option, (count, percentage))| OptionTally {
                    option_id: option.id.clone(),
                    label: option.label.clone(),
                    count: *count,
                    percentage,
                })
                .collect();
        }
        QuestionKind::Rating { .. } | QuestionKind::Nps => {
            let values: Vec<f64> = answers
                .iter()
                .filter_map(|answer| match answer {
                    AnswerValue::Rating(v) | AnswerValue::Nps(v) => Some(f64::from(*v)),
                    _ => None,
                })
                .collect();
            if !values.is_empty() {
                results.average = Some(values.iter().sum::<f64>() / values.len() as f64);
            }
        }
        QuestionKind::Text { .. } => {
            results.text_answers = answers
                .iter()
                .filter_map(|answer| match answer {
                    AnswerValue::Text(text) if !text.trim().is_empty() => Some(text.clone()),
                    _ => None,
                })
                .collect();
        }
    }

    results
}
