//! Question identity tokens and question specifications.

use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::render::Submitter;
use crate::error::StepError;

/// Opaque identity of one question declaration instance.
///
/// Minted once per declaration lifetime and never reused. Two declarations
/// sharing the same external `id` still get distinct identities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QuestionId(Uuid);

impl QuestionId {
    /// Mint a fresh identity.
    pub fn mint() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for QuestionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An asynchronous step result.
pub type Deferred<T> = BoxFuture<'static, Result<T, StepError>>;

/// Result of a transform or validate step: available now, or later.
pub enum StepOutcome<T> {
    Immediate(T),
    Deferred(Deferred<T>),
}

impl<T> StepOutcome<T> {
    /// Wrap a future as a deferred outcome.
    pub fn deferred<F>(future: F) -> Self
    where
        F: Future<Output = Result<T, StepError>> + Send + 'static,
    {
        Self::Deferred(future.boxed())
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self, Self::Deferred(_))
    }
}

impl StepOutcome<Option<String>> {
    /// Immediate acceptance.
    pub fn accept() -> Self {
        Self::Immediate(None)
    }

    /// Immediate rejection with a reason shown to the interviewee.
    pub fn reject(reason: impl Into<String>) -> Self {
        Self::Immediate(Some(reason.into()))
    }
}

impl<T> std::fmt::Debug for StepOutcome<T>
where
    T: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Immediate(value) => f.debug_tuple("Immediate").field(value).finish(),
            Self::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

type AnswerFn = Arc<dyn Fn(&Value) -> String + Send + Sync>;
type TransformFn<W> = Arc<dyn Fn(Value, &QuestionSpec<W>) -> StepOutcome<Value> + Send + Sync>;
type ValidateFn = Arc<dyn Fn(&Value) -> StepOutcome<Option<String>> + Send + Sync>;
type InputFn<W> = Arc<dyn Fn(Submitter) -> W + Send + Sync>;

/// Render a raw value the way a person would read it: strings verbatim,
/// everything else as JSON.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Everything the interview needs to ask one question.
///
/// `W` is the input widget type produced for the renderer.
pub struct QuestionSpec<W> {
    id: String,
    text: String,
    answer: AnswerFn,
    transform: TransformFn<W>,
    validate: ValidateFn,
    input: InputFn<W>,
}

impl<W> Clone for QuestionSpec<W> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            text: self.text.clone(),
            answer: Arc::clone(&self.answer),
            transform: Arc::clone(&self.transform),
            validate: Arc::clone(&self.validate),
            input: Arc::clone(&self.input),
        }
    }
}

impl<W> std::fmt::Debug for QuestionSpec<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuestionSpec")
            .field("id", &self.id)
            .field("text", &self.text)
            .finish_non_exhaustive()
    }
}

impl<W: 'static> QuestionSpec<W> {
    /// Create a question with the default answer formatter, transform
    /// (both stringify) and validation (always accepts).
    pub fn new(
        id: impl Into<String>,
        text: impl Into<String>,
        input: impl Fn(Submitter) -> W + Send + Sync + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            answer: Arc::new(stringify),
            transform: Arc::new(|raw: Value, _: &QuestionSpec<W>| {
                StepOutcome::Immediate(Value::String(stringify(&raw)))
            }),
            validate: Arc::new(|_: &Value| StepOutcome::accept()),
            input: Arc::new(input),
        }
    }

    /// Override how the raw answer is echoed into the transcript.
    pub fn answer(mut self, f: impl Fn(&Value) -> String + Send + Sync + 'static) -> Self {
        self.answer = Arc::new(f);
        self
    }

    /// Override the raw → stored value transform.
    pub fn transform(
        mut self,
        f: impl Fn(Value, &QuestionSpec<W>) -> StepOutcome<Value> + Send + Sync + 'static,
    ) -> Self {
        self.transform = Arc::new(f);
        self
    }

    /// Override validation. `Some(reason)` rejects the answer.
    pub fn validate(
        mut self,
        f: impl Fn(&Value) -> StepOutcome<Option<String>> + Send + Sync + 'static,
    ) -> Self {
        self.validate = Arc::new(f);
        self
    }
}

impl<W> QuestionSpec<W> {
    /// External key the accepted value is stored under.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Question text shown to the interviewee.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn format_answer(&self, raw: &Value) -> String {
        (self.answer)(raw)
    }

    pub fn run_transform(&self, raw: Value) -> StepOutcome<Value> {
        (self.transform)(raw, self)
    }

    pub fn run_validate(&self, value: &Value) -> StepOutcome<Option<String>> {
        (self.validate)(value)
    }

    /// Build the input widget bound to `submit`.
    pub fn input(&self, submit: Submitter) -> W {
        (self.input)(submit)
    }
}

/// One option of a multiple-choice question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    pub label: String,
    pub value: Value,
}

impl Choice {
    pub fn new(label: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

impl<W: 'static> QuestionSpec<W> {
    /// A multiple-choice question.
    ///
    /// The widget submits the picked [`Choice`] serialized as JSON; the
    /// transcript shows its label and the stored value is its `value`.
    pub fn picker(
        id: impl Into<String>,
        text: impl Into<String>,
        choices: Vec<Choice>,
        input: impl Fn(Vec<Choice>, Submitter) -> W + Send + Sync + 'static,
    ) -> Self {
        Self::new(id, text, move |submit| input(choices.clone(), submit))
            .answer(|raw| match raw.get("label") {
                Some(label) => stringify(label),
                None => stringify(raw),
            })
            .transform(|raw, _| {
                let value = raw.get("value").cloned().unwrap_or(raw);
                StepOutcome::Immediate(value)
            })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn text_question() -> QuestionSpec<()> {
        QuestionSpec::new("name", "What is your name?", |_| ())
    }

    #[test]
    fn minted_ids_are_distinct() {
        let a = QuestionId::mint();
        let b = QuestionId::mint();
        assert_ne!(a, b);
        assert_eq!(a, a);
    }

    #[test]
    fn stringify_matches_human_reading() {
        assert_eq!(stringify(&json!("Ana")), "Ana");
        assert_eq!(stringify(&json!(42)), "42");
        assert_eq!(stringify(&json!(true)), "true");
        assert_eq!(stringify(&Value::Null), "null");
    }

    #[test]
    fn defaults_stringify_and_accept() {
        let q = text_question();
        assert_eq!(q.format_answer(&json!(7)), "7");

        match q.run_transform(json!(7)) {
            StepOutcome::Immediate(v) => assert_eq!(v, json!("7")),
            StepOutcome::Deferred(_) => panic!("default transform should be immediate"),
        }
        match q.run_validate(&json!("anything")) {
            StepOutcome::Immediate(reason) => assert!(reason.is_none()),
            StepOutcome::Deferred(_) => panic!("default validation should be immediate"),
        }
    }

    #[test]
    fn transform_sees_its_own_spec() {
        let q = text_question().transform(|raw, spec| {
            StepOutcome::Immediate(json!(format!("{}={}", spec.id(), stringify(&raw))))
        });
        match q.run_transform(json!("x")) {
            StepOutcome::Immediate(v) => assert_eq!(v, json!("name=x")),
            StepOutcome::Deferred(_) => panic!("expected immediate"),
        }
    }

    #[tokio::test]
    async fn deferred_validation_resolves() {
        let q = text_question().validate(|value| {
            let value = value.clone();
            StepOutcome::deferred(async move {
                Ok((value == json!("")).then(|| "required".to_string()))
            })
        });
        let outcome = q.run_validate(&json!(""));
        assert!(outcome.is_deferred());
        let StepOutcome::Deferred(task) = outcome else {
            unreachable!()
        };
        assert_eq!(task.await.unwrap().as_deref(), Some("required"));
    }

    #[test]
    fn picker_formats_label_and_stores_value() {
        let q: QuestionSpec<Vec<Choice>> = QuestionSpec::picker(
            "role",
            "What do you do?",
            vec![Choice::new("I am a doctor", "doctor"), Choice::new("I am a nurse", "nurse")],
            |choices, _| choices,
        );
        let raw = serde_json::to_value(Choice::new("I am a nurse", "nurse")).unwrap();
        assert_eq!(q.format_answer(&raw), "I am a nurse");
        match q.run_transform(raw) {
            StepOutcome::Immediate(v) => assert_eq!(v, json!("nurse")),
            StepOutcome::Deferred(_) => panic!("expected immediate"),
        }
    }

    #[test]
    fn debug_hides_closures() {
        let rendered = format!("{:?}", text_question());
        assert!(rendered.contains("name"));
        assert!(rendered.contains("What is your name?"));
    }
}
