//! Form-poll exports: CSV, JSON, Markdown and print-ready HTML.

use chrono::{SecondsFormat, Utc};
use serde_json::json;

use super::results::{aggregate, PollResults, QuestionResults};
use crate::entities::{AnswerValue, FormPollContent, Poll, PollContent, Vote, VotePayload};
use crate::types::{ExportFormat, ExportedFile, PollError, PollResult};

/// A form poll with at least one question and one submitted response.
pub fn has_exportable_data(poll: &Poll, votes: &[Vote]) -> bool {
    match &poll.content {
        PollContent::Form(content) => {
            !content.questions.is_empty() && form_responses(poll, votes).next().is_some()
        }
        _ => false,
    }
}

pub fn export_form_poll(poll: &Poll, votes: &[Vote], format: ExportFormat) -> PollResult<ExportedFile> {
    let PollContent::Form(content) = &poll.content else {
        return Err(PollError::unsupported("export", poll.poll_type()));
    };
    if !has_exportable_data(poll, votes) {
        return Err(PollError::NothingToExport {
            id: poll.id.clone(),
        });
    }

    let body = match format {
        ExportFormat::Csv => to_csv(poll, content, votes),
        ExportFormat::Json => to_json(poll, content, votes)?,
        ExportFormat::Markdown => to_markdown(poll, content, votes),
        ExportFormat::Pdf => to_print_html(poll, content, votes),
    };

    Ok(ExportedFile {
        file_name: format!("{}-reponses.{}", poll.slug, format.extension()),
        content_type: format.content_type().to_string(),
        body,
    })
}

type Response<'a> = (&'a Vote, &'a std::collections::BTreeMap<String, AnswerValue>);

fn form_responses<'a>(poll: &'a Poll, votes: &'a [Vote]) -> impl Iterator<Item = Response<'a>> {
    votes.iter().filter_map(move |vote| match &vote.payload {
        VotePayload::Form { answers } if vote.poll_id == poll.id => Some((vote, answers)),
        _ => None,
    })
}

/// Answer rendered with option labels instead of option ids.
fn answer_text(content: &FormPollContent, question_id: &str, answer: Option<&AnswerValue>) -> String {
    let Some(answer) = answer else {
        return String::new();
    };
    let label_of = |choice: &str| -> String {
        content
            .questions
            .iter()
            .find(|q| q.id == question_id)
            .and_then(|q| q.kind.options().iter().find(|o| o.id == choice))
            .map(|o| o.label.clone())
            .unwrap_or_else(|| choice.to_string())
    };

    match answer {
        AnswerValue::Choice(choice) => label_of(choice),
        AnswerValue::Choices(choices) => choices
            .iter()
            .map(|c| label_of(c))
            .collect::<Vec<_>>()
            .join("; "),
        other => other.display(),
    }
}

fn timestamp(vote: &Vote) -> String {
    vote.created_at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn to_csv(poll: &Poll, content: &FormPollContent, votes: &[Vote]) -> String {
    let mut header = vec![
        "Date de soumission".to_string(),
        "Nom".to_string(),
        "Email".to_string(),
    ];
    header.extend(content.questions.iter().map(|q| q.title.clone()));

    let mut lines = vec![header.iter().map(|h| csv_field(h)).collect::<Vec<_>>().join(",")];
    for (vote, answers) in form_responses(poll, votes) {
        let mut row = vec![
            timestamp(vote),
            vote.voter_name.clone().unwrap_or_default(),
            vote.voter_email.clone().unwrap_or_default(),
        ];
        row.extend(
            content
                .questions
                .iter()
                .map(|q| answer_text(content, &q.id, answers.get(&q.id))),
        );
        lines.push(row.iter().map(|f| csv_field(f)).collect::<Vec<_>>().join(","));
    }

    let mut csv = lines.join("\r\n");
    csv.push_str("\r\n");
    csv
}

fn to_json(poll: &Poll, content: &FormPollContent, votes: &[Vote]) -> PollResult<String> {
    let responses: Vec<_> = form_responses(poll, votes)
        .map(|(vote, answers)| {
            let rendered: serde_json::Map<String, serde_json::Value> = content
                .questions
                .iter()
                .map(|q| {
                    (
                        q.id.clone(),
                        json!({
                            "question": q.title,
                            "answer": answer_text(content, &q.id, answers.get(&q.id)),
                        }),
                    )
                })
                .collect();
            json!({
                "id": vote.id,
                "submitted_at": timestamp(vote),
                "voter_name": vote.voter_name,
                "voter_email": vote.voter_email,
                "answers": rendered,
            })
        })
        .collect();

    let document = json!({
        "poll": {
            "id": poll.id,
            "slug": poll.slug,
            "title": poll.title,
            "description": poll.description,
            "status": poll.status,
            "questions": content.questions,
        },
        "responses": responses,
        "exported_at": Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
    });

    Ok(serde_json::to_string_pretty(&document)?)
}

fn markdown_cell(value: &str) -> String {
    value.replace('|', "\\|").replace(['\r', '\n'], " ")
}

fn summary_lines(question: &QuestionResults) -> Vec<String> {
    let mut lines = Vec::new();
    for option in &question.options {
        lines.push(format!(
            "- {} : {} ({}%)",
            option.label, option.count, option.percentage
        ));
    }
    if let Some(average) = question.average {
        lines.push(format!("- Moyenne : {average:.1}"));
    }
    for text in question.text_answers.iter().take(10) {
        lines.push(format!("- « {} »", markdown_cell(text)));
    }
    if lines.is_empty() {
        lines.push("- Aucune réponse".to_string());
    }
    lines
}

fn to_markdown(poll: &Poll, content: &FormPollContent, votes: &[Vote]) -> String {
    let summary = aggregate(poll, votes);
    let mut out = Vec::new();

    out.push(format!("# {}", poll.title));
    if let Some(description) = poll.description.as_deref().filter(|d| !d.trim().is_empty()) {
        out.push(String::new());
        out.push(description.to_string());
    }
    out.push(String::new());
    out.push(format!("**Réponses :** {}", summary.total_responses));
    out.push(String::new());
    out.push("## Réponses".to_string());
    out.push(String::new());

    let mut header = vec!["Date".to_string(), "Nom".to_string()];
    header.extend(content.questions.iter().map(|q| markdown_cell(&q.title)));
    out.push(format!("| {} |", header.join(" | ")));
    out.push(format!("|{}", " --- |".repeat(header.len())));

    for (vote, answers) in form_responses(poll, votes) {
        let mut row = vec![
            timestamp(vote),
            markdown_cell(vote.voter_name.as_deref().unwrap_or("Anonyme")),
        ];
        row.extend(
            content
                .questions
                .iter()
                .map(|q| markdown_cell(&answer_text(content, &q.id, answers.get(&q.id)))),
        );
        out.push(format!("| {} |", row.join(" | ")));
    }

    if let PollResults::Form { questions } = &summary.results {
        out.push(String::new());
        out.push("## Résumé par question".to_string());
        for question in questions {
            out.push(String::new());
            out.push(format!("### {} ({})", question.title, question.kind));
            out.extend(summary_lines(question));
        }
    }

    out.push(String::new());
    out.join("\n")
}

fn html_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Standalone HTML page that opens the browser's print dialog, so the
/// user can save it as PDF.
fn to_print_html(poll: &Poll, content: &FormPollContent, votes: &[Vote]) -> String {
    let summary = aggregate(poll, votes);
    let mut rows = String::new();
    for (vote, answers) in form_responses(poll, votes) {
        rows.push_str("<tr>");
        rows.push_str(&format!("<td>{}</td>", html_escape(&timestamp(vote))));
        rows.push_str(&format!(
            "<td>{}</td>",
            html_escape(vote.voter_name.as_deref().unwrap_or("Anonyme"))
        ));
        for question in &content.questions {
            rows.push_str(&format!(
                "<td>{}</td>",
                html_escape(&answer_text(content, &question.id, answers.get(&question.id)))
            ));
        }
        rows.push_str("</tr>\n");
    }

    let headers: String = content
        .questions
        .iter()
        .map(|q| format!("<th>{}</th>", html_escape(&q.title)))
        .collect();

    let mut sections = String::new();
    if let PollResults::Form { questions } = &summary.results {
        for question in questions {
            sections.push_str(&format!("<h3>{}</h3>\n<ul>\n", html_escape(&question.title)));
            for line in summary_lines(question) {
                let item = line.trim_start_matches("- ");
                sections.push_str(&format!("<li>{}</li>\n", html_escape(item)));
            }
            sections.push_str("</ul>\n");
        }
    }

    let description = poll
        .description
        .as_deref()
        .map(|d| format!("<p>{}</p>", html_escape(d)))
        .unwrap_or_default();

    format!(
        r#"<!DOCTYPE html>
<html lang="fr">
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>
body {{ font-family: system-ui, sans-serif; margin: 2rem; color: #1f2937; }}
table {{ border-collapse: collapse; width: 100%; font-size: 0.85rem; }}
th, td {{ border: 1px solid #d1d5db; padding: 0.4rem; text-align: left; vertical-align: top; }}
th {{ background: #f3f4f6; }}
@media print {{ body {{ margin: 0; }} h2 {{ page-break-before: always; }} }}
</style>
</head>
<body onload="window.print()">
<h1>{title}</h1>
{description}
<p><strong>Réponses :</strong> {total}</p>
<table>
<thead><tr><th>Date</th><th>Nom</th>{headers}</tr></thead>
<tbody>
{rows}</tbody>
</table>
<h2>Résumé par question</h2>
{sections}</body>
</html>
"#,
        title = html_escape(&poll.title),
        description = description,
        total = summary.total_responses,
        headers = headers,
        rows = rows,
        sections = sections,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{DatePollContent, FormQuestion, QuestionKind, QuestionOption};
    use std::collections::BTreeMap;

    fn form_poll() -> Poll {
        Poll::new(
            "Retour atelier",
            FormPollContent {
                questions: vec![
                    FormQuestion {
                        id: "q1".into(),
                        title: "Format".into(),
                        required: true,
                        kind: QuestionKind::SingleChoice {
                            options: vec![
                                QuestionOption::new("o1", "Présentiel"),
                                QuestionOption::new("o2", "Visio"),
                            ],
                        },
                    },
                    FormQuestion {
                        id: "q2".into(),
                        title: "Commentaire".into(),
                        required: false,
                        kind: QuestionKind::Text { placeholder: None },
                    },
                ],
                ..Default::default()
            }
            .into(),
        )
    }

    fn response(poll: &Poll, name: &str, choice: &str, comment: &str) -> Vote {
        let mut answers = BTreeMap::new();
        answers.insert("q1".to_string(), AnswerValue::Choice(choice.into()));
        answers.insert("q2".to_string(), AnswerValue::Text(comment.into()));
        Vote::new(&poll.id, Some(name.into()), VotePayload::Form { answers })
    }

    #[test]
    fn test_exportable_data_requires_form_responses() {
        let poll = form_poll();
        assert!(!has_exportable_data(&poll, &[]));
        let votes = vec![response(&poll, "Alice", "o1", "Top")];
        assert!(has_exportable_data(&poll, &votes));

        let date_poll = Poll::new("Dates", DatePollContent::default().into());
        assert!(!has_exportable_data(&date_poll, &votes));
    }

    #[test]
    fn test_csv_quotes_special_characters() {
        let poll = form_poll();
        let votes = vec![response(&poll, "Alice", "o2", "Bien, mais \"long\"\nTrès long")];
        let file = export_form_poll(&poll, &votes, ExportFormat::Csv).unwrap();

        assert!(file.file_name.ends_with(".csv"));
        let mut lines = file.body.split("\r\n");
        assert_eq!(lines.next().unwrap(), "Date de soumission,Nom,Email,Format,Commentaire");
        assert!(file.body.contains(",Alice,,Visio,\"Bien, mais \"\"long\"\"\nTrès long\""));
    }

    #[test]
    fn test_markdown_contains_table_and_summary() {
        let poll = form_poll();
        let votes = vec![
            response(&poll, "Alice", "o1", "Top"),
            response(&poll, "Bob", "o1", "A | B"),
        ];
        let file = export_form_poll(&poll, &votes, ExportFormat::Markdown).unwrap();
        assert!(file.body.starts_with("# Retour atelier"));
        assert!(file.body.contains("**Réponses :** 2"));
        assert!(file.body.contains("A \\| B"));
        assert!(file.body.contains("- Présentiel : 2 (100%)"));
    }

    #[test]
    fn test_json_and_html_exports() {
        let poll = form_poll();
        let votes = vec![response(&poll, "<Alice>", "o1", "ok")];

        let json_file = export_form_poll(&poll, &votes, ExportFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json_file.body).unwrap();
        assert_eq!(value["responses"][0]["answers"]["q1"]["answer"], "Présentiel");

        let html = export_form_poll(&poll, &votes, ExportFormat::Pdf).unwrap();
        assert_eq!(html.content_type, "text/html; charset=utf-8");
        assert!(html.body.contains("&lt;Alice&gt;"));
        assert!(html.body.contains("window.print()"));
    }

    #[test]
    fn test_non_form_and_empty_polls_are_rejected() {
        let date_poll = Poll::new("Dates", DatePollContent::default().into());
        assert!(matches!(
            export_form_poll(&date_poll, &[], ExportFormat::Csv),
            Err(PollError::UnsupportedAction { .. })
        ));
        assert!(matches!(
            export_form_poll(&form_poll(), &[], ExportFormat::Json),
            Err(PollError::NothingToExport { .. })
        ));
    }
}
