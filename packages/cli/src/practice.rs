//! Interactive practice loop over any line-based input.

use std::io::{BufRead, Write};

use anyhow::{Context, Result};

use rememberizer_engine::{
    Domain, DomainId, Fact, LearningEngine, LearningStore, Question, SessionState, TurnDirective,
};

/// What happened during one practice run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PracticeReport {
    pub cards_shown: usize,
    pub questions_answered: usize,
    pub correct_answers: usize,
    pub exhausted: bool,
}

enum Reply {
    Quit,
    Line(String),
}

fn read_reply<R: BufRead>(input: &mut R) -> Result<Reply> {
    let mut line = String::new();
    if input.read_line(&mut line).context("reading input")? == 0 {
        return Ok(Reply::Quit);
    }
    let line = line.trim();
    if line.eq_ignore_ascii_case("q") || line.eq_ignore_ascii_case("quit") {
        return Ok(Reply::Quit);
    }
    Ok(Reply::Line(line.to_string()))
}

fn print_card<W: Write>(
    out: &mut W,
    domain: &Domain,
    fact: &Fact,
    highlight: Option<&str>,
) -> Result<()> {
    writeln!(out)?;
    writeln!(out, "=== {} ===", domain.name)?;
    for field in &domain.fields {
        let value = fact.value(field).unwrap_or_default();
        if highlight == Some(field.as_str()) {
            writeln!(out, "> {field}: {value}  <")?;
        } else {
            writeln!(out, "  {field}: {value}")?;
        }
    }
    write!(out, "Press Enter when you have learned this (q to quit): ")?;
    out.flush()?;
    Ok(())
}

fn print_question<W: Write>(out: &mut W, number: u32, question: &Question) -> Result<()> {
    writeln!(out)?;
    match &question.cue {
        Some(cue) => writeln!(
            out,
            "Q{number}. {} = {}. What is its {}?",
            cue.field, cue.value, question.field
        )?,
        None => writeln!(out, "Q{number}. Pick the {}:", question.field)?,
    }
    for (index, option) in question.options.iter().enumerate() {
        writeln!(out, "  {}) {option}", index + 1)?;
    }
    Ok(())
}

/// Reads a 1-based option number until a valid one arrives.
fn read_choice<R: BufRead, W: Write>(
    input: &mut R,
    out: &mut W,
    option_count: usize,
) -> Result<Option<usize>> {
    loop {
        write!(out, "Answer [1-{option_count}]: ")?;
        out.flush()?;
        match read_reply(input)? {
            Reply::Quit => return Ok(None),
            Reply::Line(line) => match line.parse::<usize>() {
                Ok(choice) if (1..=option_count).contains(&choice) => {
                    return Ok(Some(choice - 1))
                }
                _ => writeln!(out, "Please enter a number between 1 and {option_count}.")?,
            },
        }
    }
}

/// Runs turns until the learner quits, input ends, `max_turns` is reached or
/// nothing is eligible.
pub fn run<S, R, W>(
    engine: &LearningEngine<S>,
    domain: &Domain,
    user_id: &str,
    input: &mut R,
    out: &mut W,
    max_turns: Option<usize>,
) -> Result<PracticeReport>
where
    S: LearningStore,
    R: BufRead,
    W: Write,
{
    let domain_id: DomainId = domain.id;
    let mut session: SessionState = engine.start_session(domain_id, user_id)?;
    let mut report = PracticeReport::default();
    let mut turns = 0usize;

    while max_turns.map_or(true, |max| turns < max) {
        turns += 1;
        let turn = engine.next_turn(domain_id, user_id, &session)?;

        match turn.directive {
            TurnDirective::NoEligibleFact => {
                writeln!(out, "Nothing left to practice in {}.", domain.name)?;
                report.exhausted = true;
                break;
            }
            TurnDirective::ShowFact {
                fact,
                highlight_field,
                ..
            } => {
                report.cards_shown += 1;
                print_card(out, domain, &fact, highlight_field.as_deref())?;
                if let Reply::Quit = read_reply(input)? {
                    break;
                }
                session = engine.acknowledge_fact(domain_id, user_id, fact.id, &turn.session)?;
            }
            TurnDirective::AskQuestion {
                question,
                question_number,
                ..
            } => {
                print_question(out, question_number, &question)?;
                let Some(chosen) = read_choice(input, out, question.options.len())? else {
                    break;
                };
                let answer = engine.submit_answer(
                    domain_id,
                    user_id,
                    question.fact_id,
                    &question.field,
                    chosen,
                    question.correct_index,
                    &turn.session.session_id,
                )?;
                report.questions_answered += 1;
                if answer.correct {
                    report.correct_answers += 1;
                    writeln!(out, "Correct!")?;
                } else {
                    writeln!(
                        out,
                        "Wrong. The {} is {}.",
                        question.field,
                        question.correct_answer()
                    )?;
                }
                session = engine.apply_answer(&turn.session, &answer)?;
            }
        }
    }

    writeln!(out)?;
    writeln!(
        out,
        "Session over: {} cards, {}/{} correct.",
        report.cards_shown, report.correct_answers, report.questions_answered
    )?;
    Ok(report)
}
