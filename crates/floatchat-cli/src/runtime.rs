// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, bail};
use floatchat_app::{Answer, OutboundRequest, Record, RequestId, RequestOutcome, RowSet};
use floatchat_client::Client;
use floatchat_testkit::{ArgoFaker, SAMPLE_QUESTIONS, heterogeneous_position_rows};
use floatchat_tui::{AppRuntime, InternalEvent};
use std::sync::mpsc::Sender;
use std::thread;
use tracing::{debug, warn};

/// Sends a failure for its request unless an outcome was delivered first,
/// so a panicking worker still settles the round trip.
struct CompletionGuard {
    request_id: RequestId,
    tx: Sender<InternalEvent>,
    delivered: bool,
}

impl CompletionGuard {
    fn new(request_id: RequestId, tx: Sender<InternalEvent>) -> Self {
        Self {
            request_id,
            tx,
            delivered: false,
        }
    }

    fn deliver(mut self, outcome: RequestOutcome) {
        self.delivered = true;
        if self
            .tx
            .send(InternalEvent::Outcome {
                request_id: self.request_id,
                outcome,
            })
            .is_err()
        {
            debug!(
                request_id = self.request_id.get(),
                "ui gone before answer arrived"
            );
        }
    }
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        if self.delivered {
            return;
        }
        warn!(
            request_id = self.request_id.get(),
            "answer worker stopped without replying"
        );
        let _ = self.tx.send(InternalEvent::Outcome {
            request_id: self.request_id,
            outcome: RequestOutcome::Failed("answer worker stopped before replying".to_owned()),
        });
    }
}

fn outcome_of(result: Result<Answer>) -> RequestOutcome {
    match result {
        Ok(answer) => RequestOutcome::Answered(answer),
        Err(error) => RequestOutcome::Failed(format!("{error:#}")),
    }
}

/// Talks to the answering service; each question runs on its own worker.
pub struct ServiceRuntime {
    client: Client,
}

impl ServiceRuntime {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl AppRuntime for ServiceRuntime {
    fn ask(&mut self, question: &str) -> Result<Answer> {
        self.client.ask(question)
    }

    fn spawn_ask(&mut self, request: &OutboundRequest, tx: Sender<InternalEvent>) -> Result<()> {
        let client = self.client.clone();
        let request = request.clone();
        thread::Builder::new()
            .name("floatchat-ask".to_owned())
            .spawn(move || {
                let guard = CompletionGuard::new(request.request_id, tx);
                guard.deliver(outcome_of(client.ask(&request.question)));
            })
            .context("spawn answer worker thread")?;
        Ok(())
    }
}

/// Offline answers over synthetic ARGO rows, picked by keywords in the
/// question.
pub struct DemoRuntime {
    faker: ArgoFaker,
}

impl DemoRuntime {
    pub fn new(seed: u64) -> Self {
        Self {
            faker: ArgoFaker::new(seed),
        }
    }

    fn profile(&mut self, question: &str) -> Answer {
        let platform = float_number(question).unwrap_or_else(|| self.faker.platform_number());
        let rows = self.faker.profile(platform, 24);
        let deepest = rows
            .last()
            .and_then(|row| row.get("pressure"))
            .and_then(serde_json::Value::as_f64)
            .unwrap_or_default();
        Answer {
            summary: format!(
                "Float {platform} recorded {} levels down to {deepest:.0} dbar on its latest cycle.",
                rows.len()
            ),
            sql: Some(format!(
                "SELECT platform_number, cycle_number, juld, latitude, longitude, pressure, temperature, salinity\nFROM argo_profiles\nWHERE platform_number = {platform}\nORDER BY pressure"
            )),
            data: Some(rows),
        }
    }

    fn positions(&mut self, count: usize) -> Answer {
        let rows = self.faker.positions(count);
        Answer {
            summary: format!("Found {} floats with recent surface fixes.", rows.len()),
            sql: Some(
                "SELECT platform_number, juld, latitude, longitude, temperature\nFROM argo_positions\nORDER BY juld DESC\nLIMIT 8"
                    .to_owned(),
            ),
            data: Some(rows),
        }
    }

    fn warmest(&mut self) -> Answer {
        let mut rows = self.faker.positions(6);
        rows.sort_by(|left, right| {
            let temperature = |row: &Record| {
                row.get("temperature")
                    .and_then(serde_json::Value::as_f64)
                    .unwrap_or(f64::NEG_INFINITY)
            };
            temperature(right).total_cmp(&temperature(left))
        });
        rows.truncate(3);
        Answer {
            summary: "The warmest surface readings came from these floats.".to_owned(),
            sql: Some(
                "SELECT platform_number, juld, latitude, longitude, temperature\nFROM argo_positions\nORDER BY temperature DESC\nLIMIT 3"
                    .to_owned(),
            ),
            data: Some(rows),
        }
    }

    fn counts(&mut self) -> Answer {
        let rows = self.faker.monthly_counts(6);
        Answer {
            summary: "Monthly profile counts for the first half of 2023.".to_owned(),
            sql: Some(
                "SELECT strftime('%Y-%m', juld) AS month, COUNT(*) AS profile_count\nFROM argo_profiles\nGROUP BY month"
                    .to_owned(),
            ),
            data: Some(rows),
        }
    }

    fn gappy(&self) -> Answer {
        let rows: RowSet = heterogeneous_position_rows();
        Answer {
            summary: "Two fixes came back, one without a latitude.".to_owned(),
            sql: None,
            data: Some(rows),
        }
    }
}

impl AppRuntime for DemoRuntime {
    fn ask(&mut self, question: &str) -> Result<Answer> {
        let lowered = question.to_lowercase();
        let mentions = |words: &[&str]| words.iter().any(|word| lowered.contains(word));

        if mentions(&["fail", "error"]) {
            bail!("database unavailable");
        }
        if mentions(&["gap", "missing", "broken"]) {
            return Ok(self.gappy());
        }
        if mentions(&["how many", "count"]) {
            return Ok(self.counts());
        }
        if mentions(&["profile", "depth", "salinity", "cycle"]) {
            return Ok(self.profile(question));
        }
        if mentions(&["warm", "hot"]) {
            return Ok(self.warmest());
        }
        if mentions(&["where", "near", "position", "map"]) {
            return Ok(self.positions(8));
        }

        let suggestions = SAMPLE_QUESTIONS
            .iter()
            .map(|sample| format!("  - {sample}"))
            .collect::<Vec<_>>()
            .join("\n");
        Ok(Answer {
            summary: format!("I can answer questions like:\n{suggestions}"),
            data: None,
            sql: None,
        })
    }
}

/// First number in the question long enough to be a float id.
fn float_number(question: &str) -> Option<i64> {
    question
        .split(|ch: char| !ch.is_ascii_digit())
        .filter(|token| token.len() >= 4)
        .find_map(|token| token.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::{CompletionGuard, DemoRuntime, SAMPLE_QUESTIONS, ServiceRuntime, float_number};
    use anyhow::Result;
    use floatchat_app::{
        ConversationEvent, ConversationState, RequestId, RequestOutcome, classify, select_views,
    };
    use floatchat_client::Client;
    use floatchat_tui::{AppRuntime, InternalEvent};
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn float_number_skips_short_numbers() {
        assert_eq!(
            float_number("Plot the temperature profile for float 53548 on cycle 97"),
            Some(53_548)
        );
        assert_eq!(float_number("cycle 97 only"), None);
    }

    #[test]
    fn demo_profile_question_charts_one_float() -> Result<()> {
        let mut runtime = DemoRuntime::new(1);
        let answer = runtime.ask("Plot the temperature profile for float 53548 on cycle 97")?;
        let rows = answer.data.unwrap_or_default();
        let plan = select_views(&classify(&rows));
        assert!(plan.show_chart);
        assert!(plan.show_map);
        assert_eq!(rows[0]["platform_number"], serde_json::json!(53_548));
        assert!(answer.sql.is_some_and(|sql| sql.contains("53548")));
        Ok(())
    }

    #[test]
    fn demo_position_and_count_questions_pick_views() -> Result<()> {
        let mut runtime = DemoRuntime::new(2);
        let positions = runtime.ask("Where are the floats near the equator?")?;
        let plan = select_views(&classify(&positions.data.unwrap_or_default()));
        assert!(plan.show_map && plan.show_table);

        let counts = runtime.ask("How many profiles were recorded in March 2023?")?;
        let plan = select_views(&classify(&counts.data.unwrap_or_default()));
        assert!(plan.show_table && !plan.show_map && !plan.show_chart);
        Ok(())
    }

    #[test]
    fn demo_unknown_question_suggests_samples() -> Result<()> {
        let mut runtime = DemoRuntime::new(5);
        let answer = runtime.ask("hello there")?;
        assert!(answer.data.is_none());
        for sample in SAMPLE_QUESTIONS {
            assert!(answer.summary.contains(sample));
        }
        Ok(())
    }

    #[test]
    fn demo_sample_questions_all_get_answers() -> Result<()> {
        let mut runtime = DemoRuntime::new(6);
        for sample in SAMPLE_QUESTIONS {
            let answer = runtime.ask(sample)?;
            assert!(answer.data.is_some_and(|rows| !rows.is_empty()), "{sample}");
        }
        Ok(())
    }

    #[test]
    fn demo_failure_question_errors() {
        let mut runtime = DemoRuntime::new(3);
        let error = runtime
            .ask("make it fail")
            .expect_err("failure keyword should error");
        assert_eq!(error.to_string(), "database unavailable");
    }

    #[test]
    fn demo_warmest_sorts_descending() -> Result<()> {
        let mut runtime = DemoRuntime::new(4);
        let answer = runtime.ask("Which float reported the warmest surface temperature?")?;
        let temps = answer
            .data
            .unwrap_or_default()
            .iter()
            .filter_map(|row| row["temperature"].as_f64())
            .collect::<Vec<_>>();
        assert_eq!(temps.len(), 3);
        assert!(temps.windows(2).all(|pair| pair[0] >= pair[1]));
        Ok(())
    }

    #[test]
    fn dropped_guard_reports_failure() {
        let (tx, rx) = mpsc::channel();
        drop(CompletionGuard::new(RequestId::new(9), tx));
        match rx.try_recv() {
            Ok(InternalEvent::Outcome {
                request_id,
                outcome: RequestOutcome::Failed(detail),
            }) => {
                assert_eq!(request_id, RequestId::new(9));
                assert!(detail.contains("stopped before replying"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn delivered_guard_sends_exactly_once() {
        let (tx, rx) = mpsc::channel();
        CompletionGuard::new(RequestId::new(2), tx).deliver(RequestOutcome::Failed("x".to_owned()));
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn service_runtime_reports_unreachable_service_through_channel() -> Result<()> {
        let client = Client::new("http://127.0.0.1:1", Duration::from_millis(200))?;
        let mut runtime = ServiceRuntime::new(client);
        let mut state = ConversationState::default();
        let events = state.submit("anyone there?");
        let outbound = ConversationEvent::outbound(&events)
            .cloned()
            .expect("request started");

        let (tx, rx) = mpsc::channel();
        runtime.spawn_ask(&outbound, tx)?;
        match rx.recv_timeout(Duration::from_secs(10))? {
            InternalEvent::Outcome {
                request_id,
                outcome,
            } => {
                state.resolve(request_id, outcome);
            }
            other => panic!("unexpected event: {other:?}"),
        }

        let last = state.store.last().expect("reply");
        assert!(last.is_error);
        assert!(last.content.contains("127.0.0.1:1"));
        Ok(())
    }
}
