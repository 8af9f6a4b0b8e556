use std::time::Duration;

use serde_json::{Value, json};

use chat_interview::channels::{TerminalInput, TerminalRenderer, spawn_stdin_reader};
use chat_interview::config::InterviewConfig;
use chat_interview::error::InterviewError;
use chat_interview::interview::{
    Answers, Choice, Declaration, Interview, QuestionSpec, StepOutcome, Transcript, stringify,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut config = InterviewConfig::from_env()?;
    if config.greeting.is_none() {
        config.greeting = Some("Hi, welcome aboard".to_string());
    }

    eprintln!("📝 Interview v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Answer each question and press Enter. Ctrl-D to quit.\n");

    let renderer = TerminalRenderer::new(config.clone());
    let _stdin_handle = spawn_stdin_reader(renderer.slot());

    let mut interview: Interview<TerminalInput> =
        Interview::new(config, renderer).with_declarations(questionnaire);
    let answers = match interview.run().await {
        Ok(answers) => answers,
        Err(InterviewError::Closed) => {
            eprintln!("\n👋 Interview cancelled");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    println!("{}", serde_json::to_string_pretty(&answers)?);
    Ok(())
}

/// Onboarding questionnaire for shift workers.
///
/// The specialty question reuses the `role` id so a doctor's answer is
/// refined in place; a young pneumologist is asked to confirm their age.
fn questionnaire(answers: &Answers, _log: &Transcript) -> Vec<Declaration<TerminalInput>> {
    let mut questions = vec![
        Declaration::new("name", name_question()),
        Declaration::new("age", age_question()),
        Declaration::new("role", role_question()),
    ];

    let role = answers.get("role").and_then(Value::as_str);
    let age = answers.get("age").and_then(Value::as_i64);

    if role == Some("doctor") {
        questions.push(Declaration::new("specialty", specialty_question()));
    }
    if let Some(age) = age
        && role == Some("pneumologist")
        && age < 32
    {
        questions.push(Declaration::new("age_check", age_check_question(age, "pneumologist")));
    }
    questions
}

fn name_question() -> QuestionSpec<TerminalInput> {
    QuestionSpec::new("name", "What's your name?", TerminalInput::Text)
        .transform(|raw, _| StepOutcome::Immediate(json!(stringify(&raw).trim().to_uppercase())))
        .validate(|name| match name.as_str() {
            Some(name) if !name.is_empty() => StepOutcome::accept(),
            _ => StepOutcome::reject("We need your name"),
        })
}

fn parse_age(raw: &Value) -> Value {
    stringify(raw)
        .trim()
        .parse::<i64>()
        .map(Value::from)
        .unwrap_or(Value::Null)
}

fn age_question() -> QuestionSpec<TerminalInput> {
    QuestionSpec::new("age", "How old are you?", TerminalInput::Text)
        .transform(|raw, _| StepOutcome::Immediate(parse_age(&raw)))
        .validate(|age| match age.as_i64() {
            None => StepOutcome::reject("I didn't get that, age must be a number."),
            Some(age) if age < 18 => StepOutcome::reject("Under-18s shouldn't be taking shifts"),
            // Simulates a slow remote check.
            Some(_) => StepOutcome::deferred(async {
                tokio::time::sleep(Duration::from_secs(3)).await;
                Ok(None)
            }),
        })
}

fn role_question() -> QuestionSpec<TerminalInput> {
    QuestionSpec::picker(
        "role",
        "What's your profession?",
        vec![
            Choice::new("I'm a doctor", "doctor"),
            Choice::new("I'm a nurse", "nurse"),
            Choice::new("I'm an administrator", "admin"),
            Choice::new("Something else", "other"),
        ],
        TerminalInput::choices,
    )
}

fn specialty_question() -> QuestionSpec<TerminalInput> {
    QuestionSpec::picker(
        "role",
        "What's your specialty?",
        vec![
            Choice::new("I'm a pneumologist", "pneumologist"),
            Choice::new("I'm a general practitioner", "general_practitioner"),
        ],
        TerminalInput::choices,
    )
}

fn age_check_question(previous: i64, role: &'static str) -> QuestionSpec<TerminalInput> {
    QuestionSpec::new(
        "age",
        format!("How old are you again? I understood {previous}"),
        TerminalInput::Text,
    )
    .transform(|raw, _| StepOutcome::Immediate(parse_age(&raw)))
    .validate(move |age| match age.as_i64() {
        None => StepOutcome::reject("I didn't get that, age must be a number."),
        Some(age) if age < 27 => {
            StepOutcome::reject(format!("That makes no sense, how can a {role} be that young?"))
        }
        Some(_) => StepOutcome::accept(),
    })
}
