// SPDX-FileCopyrightText: 2025 Abe Kohandel <abe@kodebooth.com>
// SPDX-License-Identifier: MIT

use bon::Builder;

use crate::{
    error::{RecordLockError, Result, ValidationErrors},
    identity::element_id,
    meta::Meta,
    model::{Answer, Record},
    reconcile::{Reconciler, SubElementKind},
};

/// Answers of a record, kept in order.
#[derive(Debug, Clone, Copy)]
pub struct Answers;

pub type AnswerReconciler<P> = Reconciler<P, Answers>;

#[derive(Builder, Debug, Clone, Default, PartialEq, Eq)]
pub struct AnswerFields {
    /// Space separated value, e.g. `"10 mail.example.com"` for an MX answer.
    #[builder(into)]
    pub answer: String,
    #[builder(into)]
    pub region: Option<String>,
    #[builder(default, into)]
    pub meta: Meta,
}

impl SubElementKind for Answers {
    const NAME: &'static str = "answer";
    const ID_PREFIX: &'static str = "ans";

    type Fields = AnswerFields;
    type Element = Answer;

    fn build(record: &Record, fields: &AnswerFields) -> Answer {
        let mut answer = if record.is_text() {
            Answer::text(&fields.answer)
        } else {
            Answer::new(&fields.answer)
        };
        answer.region = fields.region.clone().filter(|r| !r.is_empty());
        answer.meta = fields.meta.clone();
        answer
    }

    fn validate(fields: &AnswerFields) -> Result<()> {
        let errors = fields.meta.validate();
        if !errors.is_empty() {
            return Err(RecordLockError::Validation(ValidationErrors::new(
                "answer metadata",
                errors,
            )));
        }
        Ok(())
    }

    fn fields(answer: &Answer) -> AnswerFields {
        AnswerFields {
            answer: answer.value(),
            region: answer.region.clone(),
            meta: answer.meta.clone(),
        }
    }

    fn seed(key: &str) -> AnswerFields {
        AnswerFields {
            answer: key.to_string(),
            ..Default::default()
        }
    }

    fn has_auxiliary(fields: &AnswerFields) -> bool {
        fields.region.as_deref().is_some_and(|r| !r.is_empty()) || !fields.meta.is_empty()
    }

    fn matches(a: &Answer, b: &Answer) -> bool {
        Self::same_primary(a, b) && a.region == b.region && a.meta == b.meta
    }

    fn same_primary(a: &Answer, b: &Answer) -> bool {
        a.value() == b.value()
    }

    fn id(record: &str, answer: &Answer) -> String {
        element_id(
            Self::ID_PREFIX,
            record,
            &answer.value(),
            answer.region.as_deref(),
            &answer.meta,
        )
    }

    fn elements(record: &Record) -> Vec<Answer> {
        record.answers.clone()
    }

    fn insert(record: &mut Record, answer: Answer) {
        record.answers.push(answer);
    }

    fn replace(record: &mut Record, old: &Answer, mut new: Answer) -> Result<()> {
        if let Some(slot) = record.answers.iter_mut().find(|a| Self::matches(a, old)) {
            new.extra = std::mem::take(&mut slot.extra);
            *slot = new;
        }
        Ok(())
    }

    fn remove(record: &mut Record, target: &Answer) -> usize {
        let before = record.answers.len();
        record.answers.retain(|a| !Self::matches(a, target));
        before - record.answers.len()
    }
}
