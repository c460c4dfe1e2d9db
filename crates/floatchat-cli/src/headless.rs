// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow};
use floatchat_app::{ConversationEvent, ConversationState, Message, RequestOutcome, Strictness};
use floatchat_tui::{
    AppRuntime, FALLBACK_BODY, FALLBACK_TITLE, InternalEvent, MessageView, PanicLogGuard,
    RenderBoundary, SQL_HEADING, build_message_view, rejection_notice,
};
use std::io::Write;
use std::sync::mpsc;
use std::time::Duration;

const ANSWER_WAIT: Duration = Duration::from_secs(600);

/// Runs one question without a terminal UI and prints the transcript.
/// Returns whether the reply was an answer rather than a failure notice.
pub fn ask_once<R, W>(
    state: &mut ConversationState,
    runtime: &mut R,
    question: &str,
    strictness: Strictness,
    out: &mut W,
) -> Result<bool>
where
    R: AppRuntime,
    W: Write,
{
    let events = state.submit(question);
    let request = ConversationEvent::outbound(&events)
        .cloned()
        .ok_or_else(|| anyhow!("question is blank; pass some text after --ask"))?;

    let (tx, rx) = mpsc::channel();
    if let Err(error) = runtime.spawn_ask(&request, tx) {
        state.resolve(request.request_id, RequestOutcome::Failed(format!("{error:#}")));
    } else {
        loop {
            match rx.recv_timeout(ANSWER_WAIT).context("wait for answer")? {
                InternalEvent::Outcome {
                    request_id,
                    outcome,
                } => {
                    state.resolve(request_id, outcome);
                    break;
                }
                InternalEvent::ClearStatus { .. } => {}
            }
        }
    }

    // A contained render panic belongs in the log, not on stderr above the
    // fallback line.
    let _panics = PanicLogGuard::install();
    for message in state.messages() {
        write_message(out, message, strictness)?;
    }
    Ok(state.messages().last().is_some_and(|reply| !reply.is_error))
}

fn write_message<W: Write>(out: &mut W, message: &Message, strictness: Strictness) -> Result<()> {
    writeln!(
        out,
        "[{}] {}: {}",
        message.clock_label(),
        message.role.as_str(),
        message.content
    )?;
    if let Some(sql) = &message.sql {
        writeln!(out, "  {SQL_HEADING}")?;
        for line in sql.lines() {
            writeln!(out, "    {line}")?;
        }
    }
    if message.data.is_none() {
        return Ok(());
    }

    let boundary = RenderBoundary::mount(message.id, || build_message_view(message, strictness));
    match (boundary.view(), boundary.fault()) {
        (Some(view), _) => write_view(out, view)?,
        (None, Some(fault)) => {
            writeln!(out, "  [{FALLBACK_TITLE}] {FALLBACK_BODY}")?;
            writeln!(out, "  fault: {fault}")?;
        }
        (None, None) => {}
    }
    Ok(())
}

fn write_view<W: Write>(out: &mut W, view: &MessageView) -> Result<()> {
    if let Some(mismatch) = &view.plan.rejected {
        writeln!(out, "  {}", rejection_notice(mismatch))?;
        return Ok(());
    }
    if let Some(table) = &view.table {
        writeln!(out, "  table: {}", table.headers.join(" | "))?;
        for row in &table.rows {
            writeln!(out, "    {}", row.join(" | "))?;
        }
    }
    if let Some(chart) = &view.chart {
        let fields = chart
            .series
            .iter()
            .map(|series| series.field)
            .collect::<Vec<_>>();
        writeln!(
            out,
            "  chart: {} ({} vs pressure {:.0}-{:.0} dbar)",
            chart.title,
            fields.join(", "),
            chart.pressure_bounds[0],
            chart.pressure_bounds[1]
        )?;
    }
    if let Some(map) = &view.map {
        writeln!(
            out,
            "  map: centered on {:.3}, {:.3}",
            map.center.lat, map.center.lon
        )?;
        for point in &map.points {
            writeln!(out, "    {}", point.label)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::ask_once;
    use anyhow::{Result, anyhow};
    use floatchat_app::{Answer, ConversationState, Strictness};
    use floatchat_testkit::{heterogeneous_position_rows, single_float_profile_rows};
    use floatchat_tui::{AppRuntime, FALLBACK_TITLE, PanicLogGuard};
    use std::panic;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Scripted(Option<Result<Answer>>);

    impl AppRuntime for Scripted {
        fn ask(&mut self, _question: &str) -> Result<Answer> {
            self.0.take().unwrap_or_else(|| Err(anyhow!("asked twice")))
        }
    }

    fn run(reply: Result<Answer>, strictness: Strictness) -> Result<(bool, String)> {
        let mut state = ConversationState::default();
        let mut runtime = Scripted(Some(reply));
        let mut out = Vec::new();
        let ok = ask_once(&mut state, &mut runtime, "  show me  ", strictness, &mut out)?;
        Ok((ok, String::from_utf8(out)?))
    }

    #[test]
    fn answer_prints_sql_and_chart() -> Result<()> {
        let (ok, text) = run(
            Ok(Answer {
                summary: "Here is the profile.".to_owned(),
                data: Some(single_float_profile_rows()),
                sql: Some("SELECT *\nFROM profiles".to_owned()),
            }),
            Strictness::Lenient,
        )?;
        assert!(ok);
        assert!(text.contains("] user: show me\n"));
        assert!(text.contains("assistant: Here is the profile."));
        assert!(text.contains("Generated SQL Query:\n    SELECT *\n    FROM profiles"));
        assert!(text.contains("chart: Profile for Float #1 (temperature vs pressure"));
        Ok(())
    }

    #[test]
    fn faulty_rows_print_fallback_instead_of_failing() -> Result<()> {
        let (ok, text) = run(
            Ok(Answer {
                summary: "Two fixes.".to_owned(),
                data: Some(heterogeneous_position_rows()),
                sql: None,
            }),
            Strictness::Lenient,
        )?;
        assert!(ok);
        assert!(text.contains(FALLBACK_TITLE));
        assert!(text.contains("fault: row 1 has no numeric latitude"));
        Ok(())
    }

    #[test]
    fn strict_mode_prints_rejection() -> Result<()> {
        let (_, text) = run(
            Ok(Answer {
                summary: "Two fixes.".to_owned(),
                data: Some(heterogeneous_position_rows()),
                sql: None,
            }),
            Strictness::Strict,
        )?;
        assert!(text.contains("lacks `latitude`"));
        assert!(!text.contains(FALLBACK_TITLE));
        Ok(())
    }

    #[test]
    fn failure_prints_notice_and_reports_false() -> Result<()> {
        let (ok, text) = run(Err(anyhow!("database unavailable")), Strictness::Lenient)?;
        assert!(!ok);
        assert!(text.contains("Sorry, I encountered an error: database unavailable"));
        Ok(())
    }

    #[test]
    fn blank_question_is_an_error() {
        let mut state = ConversationState::default();
        let mut runtime = Scripted(None);
        let error = ask_once(
            &mut state,
            &mut runtime,
            "   ",
            Strictness::Lenient,
            &mut Vec::new(),
        )
        .expect_err("blank question should fail");
        assert!(error.to_string().contains("--ask"));
    }

    #[test]
    fn panic_guard_silences_hook_and_restores_it() {
        static REPORTED: AtomicUsize = AtomicUsize::new(0);
        let original = panic::take_hook();
        panic::set_hook(Box::new(|_| {
            REPORTED.fetch_add(1, Ordering::SeqCst);
        }));

        {
            let _guard = PanicLogGuard::install();
            let caught = panic::catch_unwind(|| -> u8 { panic!("map exploded") });
            assert!(caught.is_err());
        }
        assert_eq!(REPORTED.load(Ordering::SeqCst), 0);

        let caught = panic::catch_unwind(|| -> u8 { panic!("after restore") });
        assert!(caught.is_err());
        assert_eq!(REPORTED.load(Ordering::SeqCst), 1);

        panic::set_hook(original);
    }
}
