//! Sample polls for local development.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use doodates_polls::utils::time_slots::toggle_time_slot_for_date;
use doodates_polls::{
    AnswerValue, AvailabilityPollContent, Conversation, ConversationMessage, DatePollContent,
    FormPollContent, FormQuestion, MessageRole, Poll, PollContent, PollStore, Preference, ProposedSlot,
    QuestionKind, QuestionOption, QuizzPollContent, QuizzQuestion, TimeSlotMap, Vote, VotePayload,
};

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub polls: usize,
    pub votes: usize,
    pub conversations: usize,
}

fn team_meeting() -> (Poll, Vec<Vote>) {
    let mut slots = TimeSlotMap::new();
    for (date, hour) in [("2025-06-10", 9), ("2025-06-10", 14), ("2025-06-12", 10)] {
        slots = toggle_time_slot_for_date(&slots, date, hour, 0);
    }

    let poll = Poll::new(
        "Réunion d'équipe",
        DatePollContent {
            dates: vec!["2025-06-10".into(), "2025-06-12".into()],
            time_slots: slots,
            ..Default::default()
        }
        .into(),
    )
    .with_description("Point mensuel de l'équipe produit");

    let votes = [
        ("Alice", Preference::Yes, Preference::Maybe),
        ("Bruno", Preference::Yes, Preference::No),
        ("Chloé", Preference::Maybe, Preference::Yes),
    ]
    .into_iter()
    .map(|(name, first, second)| {
        let selections = BTreeMap::from([
            ("2025-06-10".to_string(), first),
            ("2025-06-12".to_string(), second),
        ]);
        Vote::new(&poll.id, Some(name.to_string()), VotePayload::Date { selections })
            .with_email(format!("{}@example.com", name.to_lowercase()))
    })
    .collect();

    (poll, votes)
}

fn lunch_survey() -> (Poll, Vec<Vote>) {
    let poll = Poll::new(
        "Déjeuner de rentrée",
        FormPollContent {
            questions: vec![
                FormQuestion {
                    id: "plat".into(),
                    title: "Plat préféré".into(),
                    required: true,
                    kind: QuestionKind::SingleChoice {
                        options: vec![
                            QuestionOption::new("pizza", "Pizza"),
                            QuestionOption::new("sushi", "Sushi"),
                            QuestionOption::new("salade", "Salade"),
                        ],
                    },
                },
                FormQuestion {
                    id: "note".into(),
                    title: "Note du dernier déjeuner".into(),
                    required: false,
                    kind: QuestionKind::Rating { scale: 5 },
                },
                FormQuestion {
                    id: "remarques".into(),
                    title: "Remarques".into(),
                    required: false,
                    kind: QuestionKind::Text { placeholder: None },
                },
            ],
            ..Default::default()
        }
        .into(),
    );

    let votes = [
        ("Alice", "pizza", 4, Some("Plus de choix végétariens")),
        ("Bruno", "sushi", 3, None),
        ("Chloé", "pizza", 5, None),
    ]
    .into_iter()
    .map(|(name, dish, rating, remark)| {
        let mut answers = BTreeMap::from([
            ("plat".to_string(), AnswerValue::Choice(dish.to_string())),
            ("note".to_string(), AnswerValue::Rating(rating)),
        ]);
        if let Some(remark) = remark {
            answers.insert("remarques".to_string(), AnswerValue::Text(remark.to_string()));
        }
        Vote::new(&poll.id, Some(name.to_string()), VotePayload::Form { answers })
    })
    .collect();

    (poll, votes)
}

fn client_call() -> (Poll, Vec<Vote>) {
    let slot = |date: &str, start: &str, end: &str| ProposedSlot {
        date: date.into(),
        start: start.into(),
        end: end.into(),
    };
    let morning = slot("2025-06-16", "09:00", "10:00");
    let afternoon = slot("2025-06-17", "14:30", "15:30");

    let poll = Poll::new(
        "Appel client Acme",
        AvailabilityPollContent {
            proposed_slots: vec![morning.clone(), afternoon.clone()],
            ..Default::default()
        }
        .into(),
    );
    let votes = vec![
        Vote::new(
            &poll.id,
            Some("Acme".into()),
            VotePayload::Availability {
                slots: vec![morning.clone(), afternoon],
            },
        ),
        Vote::new(
            &poll.id,
            Some("Denis".into()),
            VotePayload::Availability {
                slots: vec![morning],
            },
        ),
    ];
    (poll, votes)
}

fn capitals_quiz() -> (Poll, Vec<Vote>) {
    let poll = Poll::new(
        "Quiz des capitales",
        QuizzPollContent {
            questions: vec![
                QuizzQuestion {
                    id: "q1".into(),
                    title: "Capitale de l'Australie ?".into(),
                    options: vec![
                        QuestionOption::new("a", "Sydney"),
                        QuestionOption::new("b", "Canberra"),
                    ],
                    correct_option_ids: vec!["b".into()],
                    points: 1,
                },
                QuizzQuestion {
                    id: "q2".into(),
                    title: "Capitale du Canada ?".into(),
                    options: vec![
                        QuestionOption::new("a", "Ottawa"),
                        QuestionOption::new("b", "Toronto"),
                    ],
                    correct_option_ids: vec!["a".into()],
                    points: 2,
                },
            ],
            ..Default::default()
        }
        .into(),
    );
    let answers = BTreeMap::from([
        ("q1".to_string(), vec!["b".to_string()]),
        ("q2".to_string(), vec!["b".to_string()]),
    ]);
    let votes = vec![Vote::new(
        &poll.id,
        Some("Élodie".into()),
        VotePayload::Quizz { answers },
    )];
    (poll, votes)
}

/// Insert one poll of each type with votes, plus the conversation that
/// produced the form poll.
pub async fn seed(store: &dyn PollStore) -> Result<SeedSummary> {
    let mut summary = SeedSummary::default();

    for (mut poll, votes) in [team_meeting(), lunch_survey(), client_call(), capitals_quiz()] {
        if matches!(poll.content, PollContent::Form(_)) {
            let conversation = Conversation::new("Organisation du déjeuner")
                .linked_to(&poll.id)
                .with_messages(vec![
                    ConversationMessage::new(
                        MessageRole::User,
                        "Crée un sondage pour choisir le déjeuner de rentrée",
                    ),
                    ConversationMessage::new(
                        MessageRole::Assistant,
                        "Voici un formulaire avec trois questions.",
                    ),
                ]);
            store
                .insert_conversation(&conversation)
                .await
                .with_context(|| format!("failed to insert conversation for '{}'", poll.title))?;
            poll.conversation_id = Some(conversation.id);
            summary.conversations += 1;
        }

        store
            .insert_poll(&poll)
            .await
            .with_context(|| format!("failed to insert poll '{}'", poll.title))?;
        summary.polls += 1;

        for vote in &votes {
            store
                .insert_vote(vote)
                .await
                .with_context(|| format!("failed to insert vote for '{}'", poll.title))?;
        }
        summary.votes += votes.len();
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use doodates_polls::{MemoryPollStore, PollType};

    #[tokio::test]
    async fn test_seed_inserts_every_poll_type() {
        let store = MemoryPollStore::new();
        let summary = seed(&store).await.unwrap();

        assert_eq!(
            summary,
            SeedSummary {
                polls: 4,
                votes: 9,
                conversations: 1,
            }
        );

        let polls = store.list_polls().await.unwrap();
        for poll_type in [PollType::Date, PollType::Form, PollType::Availability, PollType::Quizz] {
            assert!(polls.iter().any(|p| p.poll_type() == poll_type));
        }

        let form = polls.iter().find(|p| p.poll_type() == PollType::Form).unwrap();
        let conversation_id = form.conversation_id.as_deref().unwrap();
        let conversation = store.find_conversation(conversation_id).await.unwrap().unwrap();
        assert_eq!(conversation.poll_id.as_deref(), Some(form.id.as_str()));
    }

    #[test]
    fn test_seed_polls_are_valid() {
        for (poll, _) in [team_meeting(), lunch_survey(), client_call(), capitals_quiz()] {
            poll.validate().unwrap();
        }
    }
}
