//! Plain-text summary of a poll's results, handed to the model as context.

use doodates_polls::services::results::{aggregate, PollResults, QuestionResults};
use doodates_polls::{Poll, PollContent, QuestionKind, Vote};

const MAX_TEXT_SAMPLES: usize = 5;

pub fn build_results_context(poll: &Poll, votes: &[Vote]) -> String {
    let summary = aggregate(poll, votes);
    let mut out = String::new();

    push_line(&mut out, format!("Sondage: {}", poll.title));
    push_line(&mut out, format!("Type: {}", poll.poll_type()));
    if let Some(description) = poll.description.as_deref().filter(|d| !d.trim().is_empty()) {
        push_line(&mut out, format!("Description: {description}"));
    }
    push_line(
        &mut out,
        format!("Nombre total de réponses: {}", summary.total_responses),
    );

    match (&summary.results, &poll.content) {
        (PollResults::Form { questions }, PollContent::Form(content)) => {
            for (index, results) in questions.iter().enumerate() {
                let kind = content
                    .questions
                    .iter()
                    .find(|q| q.id == results.question_id)
                    .map(|q| &q.kind);
                write_question(&mut out, index + 1, results, kind);
            }
        }
        (PollResults::Date { dates }, _) => {
            out.push_str("\nDisponibilités par date:\n");
            for tally in dates {
                push_line(
                    &mut out,
                    format!(
                        "- {}: {} oui, {} peut-être, {} non",
                        tally.date, tally.yes, tally.maybe, tally.no
                    ),
                );
            }
        }
        (PollResults::Availability { slots }, _) => {
            out.push_str("\nCréneaux proposés:\n");
            for tally in slots {
                push_line(
                    &mut out,
                    format!("- {}: {} disponible(s)", tally.slot.label(), tally.count),
                );
            }
        }
        (PollResults::Quizz(quizz), _) => {
            push_line(
                &mut out,
                format!("\nScore moyen: {:.1}/{}", quizz.average_score, quizz.max_score),
            );
            for question in &quizz.questions {
                push_line(
                    &mut out,
                    format!(
                        "- {}: {}/{} bonnes réponses",
                        question.title, question.correct, question.answered
                    ),
                );
            }
        }
        (PollResults::Form { .. }, _) => {}
    }

    out
}

fn write_question(
    out: &mut String,
    number: usize,
    results: &QuestionResults,
    kind: Option<&QuestionKind>,
) {
    push_line(
        out,
        format!(
            "\nQuestion {number}: {} ({}, {} réponse(s))",
            results.title, results.kind, results.responses
        ),
    );

    for option in &results.options {
        push_line(
            out,
            format!("  - {}: {} ({}%)", option.label, option.count, option.percentage),
        );
    }

    if let Some(average) = results.average {
        let scale = match kind {
            Some(QuestionKind::Rating { scale }) => u32::from(*scale),
            _ => 10,
        };
        push_line(out, format!("  Moyenne: {average:.1}/{scale}"));
    }

    if !results.text_answers.is_empty() {
        out.push_str("  Exemples de réponses:\n");
        for answer in results.text_answers.iter().take(MAX_TEXT_SAMPLES) {
            push_line(out, format!("  - \"{}\"", answer.trim()));
        }
    }
}

fn push_line(out: &mut String, line: String) {
    out.push_str(&line);
    out.push('\n');
}
