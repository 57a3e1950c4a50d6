//! Scoring and result aggregation over a session's recorded answers.
//!
//! Scoring is flat: a player whose latest submission for a question is
//! exactly correct earns that question's full points when the question
//! closes. Nothing here touches locks or storage.

use anyhow::{anyhow, Result};
use serde::Serialize;

use crate::models::{AnswerId, PlayerId, QuestionId, Session};

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerBreakdown {
    pub answer_id: AnswerId,
    pub answer: String,
    /// Names of players whose submission included this answer.
    pub players_correct: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionResult {
    pub question_id: QuestionId,
    pub answers: Vec<AnswerBreakdown>,
    /// Seconds, rounded.
    pub average_answer_time: u64,
    /// Rounded share of all players in the session, not just respondents,
    /// whose latest submission was exactly correct.
    pub percent_correct: u32,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedPlayer {
    pub name: String,
    pub score: u32,
    pub question_points: Vec<u32>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalResults {
    pub users_ranked_by_score: Vec<RankedPlayer>,
    pub question_results: Vec<QuestionResult>,
}

/// Points a player earned at a question position.
pub fn points_earned(session: &Session, player_id: PlayerId, position: usize) -> u32 {
    let question = match session.quiz.questions.get(position) {
        Some(question) => question,
        None => return 0,
    };

    match session.latest_answer(player_id, position) {
        Some(answer) if answer.is_correct => question.points,
        _ => 0,
    }
}

/// Adds the current question's points to every player who got it right.
pub fn award_points(session: &mut Session) {
    let position = match session.at_question {
        Some(position) => position,
        None => return,
    };

    let earned = session
        .players
        .iter()
        .map(|player| points_earned(session, player.player_id, position))
        .collect::<Vec<_>>();

    for (player, points) in session.players.iter_mut().zip(earned) {
        player.score = player.score.saturating_add(points);
    }
}

pub fn question_result(session: &Session, position: usize) -> Option<QuestionResult> {
    let question = session.quiz.questions.get(position)?;

    let latest = session
        .players
        .iter()
        .filter_map(|player| {
            session
                .latest_answer(player.player_id, position)
                .map(|answer| (player, answer))
        })
        .collect::<Vec<_>>();

    let answers = question
        .answers
        .iter()
        .map(|option| AnswerBreakdown {
            answer_id: option.id,
            answer: option.answer.clone(),
            players_correct: latest
                .iter()
                .filter(|(_player, answer)| answer.answer_ids.contains(&option.id))
                .map(|(player, _answer)| player.name.clone())
                .collect(),
        })
        .collect();

    let correct = latest.iter().filter(|(_player, answer)| answer.is_correct).count();
    let percent_correct = match session.players.len() {
        0 => 0,
        total => (correct as f64 / total as f64 * 100.0).round() as u32,
    };

    let average_answer_time = match session.opened_at.get(&position) {
        Some(opened) if !latest.is_empty() => {
            let total_millis: i64 = latest
                .iter()
                .map(|(_player, answer)| {
                    (answer.time_answered - *opened).num_milliseconds().max(0)
                })
                .sum();
            (total_millis as f64 / latest.len() as f64 / 1000.0).round() as u64
        }
        _ => 0,
    };

    Some(QuestionResult {
        question_id: question.id,
        answers,
        average_answer_time,
        percent_correct,
    })
}

pub fn final_results(session: &Session) -> FinalResults {
    let mut users_ranked_by_score = session
        .players
        .iter()
        .map(|player| RankedPlayer {
            name: player.name.clone(),
            score: player.score,
            question_points: (0..session.num_questions())
                .map(|position| points_earned(session, player.player_id, position))
                .collect(),
        })
        .collect::<Vec<_>>();

    // Stable sort: equal scores keep join order.
    users_ranked_by_score.sort_by(|a, b| b.score.cmp(&a.score));

    let question_results = (0..session.num_questions())
        .filter_map(|position| question_result(session, position))
        .collect();

    FinalResults {
        users_ranked_by_score,
        question_results,
    }
}

/// One row per player in ranking order, one column per question.
pub fn final_results_csv(results: &FinalResults) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());

    let header = std::iter::once("player".to_string()).chain(
        results
            .question_results
            .iter()
            .map(|result| format!("question {}", result.question_id)),
    );
    writer.write_record(header)?;

    for player in results.users_ranked_by_score.iter() {
        let row = std::iter::once(player.name.clone())
            .chain(player.question_points.iter().map(|points| points.to_string()));
        writer.write_record(row)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|err| anyhow!("couldn't flush csv writer: {}", err.error()))?;
    Ok(String::from_utf8(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::Action;
    use crate::models::{fixtures::*, Player, PlayerAnswer, QuizSnapshot, SessionId};
    use chrono::{Duration, Utc};

    fn session_with_players(names: &[&str]) -> Session {
        let quiz = quiz(
            1,
            vec![
                question(10, vec![answer(1, true), answer(2, false)]),
                question(20, vec![answer(3, true), answer(4, true), answer(5, false)]),
            ],
        );
        let mut session = Session::new(SessionId(1), QuizSnapshot::of(&quiz), 0);
        for (index, name) in names.iter().enumerate() {
            session.players.push(Player {
                player_id: PlayerId(index as u64 + 1),
                name: name.to_string(),
                score: 0,
            });
        }
        session
    }

    fn submit(session: &mut Session, player: u64, ids: &[u64], is_correct: bool, after_secs: i64) {
        let position = session.at_question.unwrap();
        let opened = session.opened_at[&position];
        session.player_answers.push(PlayerAnswer {
            player_id: PlayerId(player),
            question_position: position,
            answer_ids: ids.iter().copied().map(AnswerId).collect(),
            time_answered: opened + Duration::seconds(after_secs),
            is_correct,
        });
    }

    fn open_next(session: &mut Session) {
        session.apply(Action::NextQuestion).unwrap();
        session.apply(Action::SkipCountdown).unwrap();
        session.opened_at.insert(session.at_question.unwrap(), Utc::now());
    }

    fn close(session: &mut Session) {
        session.apply(Action::GoToAnswer).unwrap();
        award_points(session);
    }

    #[test]
    fn breakdown_lists_players_per_answer() {
        let mut session = session_with_players(&["Hayden", "Giuliana"]);
        open_next(&mut session);
        submit(&mut session, 1, &[1], true, 2);
        submit(&mut session, 2, &[2], false, 4);
        close(&mut session);

        let result = question_result(&session, 0).unwrap();
        assert_eq!(result.question_id, QuestionId(10));
        assert_eq!(result.answers[0].players_correct, vec!["Hayden".to_string()]);
        assert_eq!(result.answers[1].players_correct, vec!["Giuliana".to_string()]);
        assert_eq!(result.percent_correct, 50);
        assert_eq!(result.average_answer_time, 3);
    }

    #[test]
    fn no_respondents_is_zero_percent() {
        let mut session = session_with_players(&[]);
        open_next(&mut session);
        close(&mut session);

        let result = question_result(&session, 0).unwrap();
        assert_eq!(result.percent_correct, 0);
        assert_eq!(result.average_answer_time, 0);
        assert!(result.answers.iter().all(|a| a.players_correct.is_empty()));
    }

    #[test]
    fn only_latest_submission_scores() {
        let mut session = session_with_players(&["Hayden"]);
        open_next(&mut session);
        submit(&mut session, 1, &[1], true, 1);
        submit(&mut session, 1, &[2], false, 2);
        close(&mut session);

        assert_eq!(session.players[0].score, 0);
        let result = question_result(&session, 0).unwrap();
        assert!(result.answers[0].players_correct.is_empty());
    }

    #[test]
    fn ranking_is_by_score_then_join_order() {
        let mut session = session_with_players(&["Ann", "Bob", "Cat"]);
        open_next(&mut session);
        submit(&mut session, 2, &[1], true, 1);
        submit(&mut session, 3, &[1], true, 1);
        close(&mut session);
        open_next(&mut session);
        submit(&mut session, 3, &[3, 4], true, 1);
        submit(&mut session, 1, &[3], false, 1);
        close(&mut session);
        session.apply(Action::GoToFinalResults).unwrap();

        let results = final_results(&session);
        let ranking = results
            .users_ranked_by_score
            .iter()
            .map(|player| (player.name.as_str(), player.score))
            .collect::<Vec<_>>();
        assert_eq!(ranking, vec![("Cat", 10), ("Bob", 5), ("Ann", 0)]);
        assert_eq!(results.question_results.len(), 2);
        assert_eq!(results.question_results[1].percent_correct, 33);

        for player in results.users_ranked_by_score.iter() {
            assert_eq!(player.question_points.iter().sum::<u32>(), player.score);
        }
    }

    #[test]
    fn huge_point_values_saturate() {
        let mut session = session_with_players(&["Hayden"]);
        for question in session.quiz.questions.iter_mut() {
            question.points = u32::MAX;
        }
        open_next(&mut session);
        submit(&mut session, 1, &[1], true, 1);
        close(&mut session);
        open_next(&mut session);
        submit(&mut session, 1, &[3, 4], true, 1);
        close(&mut session);

        assert_eq!(session.players[0].score, u32::MAX);
    }

    #[test]
    fn csv_rows_sum_to_final_scores() {
        let mut session = session_with_players(&["Ann", "Bob"]);
        open_next(&mut session);
        submit(&mut session, 1, &[1], true, 1);
        close(&mut session);
        open_next(&mut session);
        submit(&mut session, 1, &[3, 4], true, 1);
        submit(&mut session, 2, &[4, 3], true, 1);
        close(&mut session);
        session.apply(Action::GoToFinalResults).unwrap();

        let results = final_results(&session);
        let csv = final_results_csv(&results).unwrap();
        assert_eq!(csv, "player,question 10,question 20\nAnn,5,5\nBob,0,5\n");

        let mut reader = csv::Reader::from_reader(csv.as_bytes());
        for (record, player) in reader.records().zip(results.users_ranked_by_score.iter()) {
            let record = record.unwrap();
            let total: u32 = record.iter().skip(1).map(|cell| cell.parse::<u32>().unwrap()).sum();
            assert_eq!(&record[0], player.name);
            assert_eq!(total, player.score);
        }
    }
}
