use crate::errors::ScopeResult;
use crate::stapler::{ScopeSource, Stapler, StaplerConfig};
use crate::time_scope::TimeScope;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum NoteKind {
    #[default]
    Note,
    Task,
}

impl NoteKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Note => "note",
            Self::Task => "task",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    /// Scope id as persisted. Older rows may carry a week or quarter id.
    pub scope: String,
    #[serde(default)]
    pub kind: NoteKind,
    /// Domain tag such as `work/billing`.
    pub domain: String,
    pub desc: String,
    pub created_at: DateTime<Utc>,
    /// Fine-grained time used to order notes sharing a scope.
    pub sort_time: Option<NaiveDateTime>,
}

/// Sort key for notes sharing a scope.
pub type NoteOrder = (Option<NaiveDateTime>, DateTime<Utc>);

impl Note {
    pub fn new(scope: &TimeScope, domain: &str, desc: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: new_note_id(now),
            scope: scope.to_string(),
            kind: NoteKind::Note,
            domain: domain.to_string(),
            desc: desc.to_string(),
            created_at: now,
            sort_time: None,
        }
    }

    pub fn task(scope: &TimeScope, domain: &str, desc: &str, now: DateTime<Utc>) -> Self {
        Self {
            kind: NoteKind::Task,
            ..Self::new(scope, domain, desc, now)
        }
    }

    pub fn with_sort_time(mut self, sort_time: NaiveDateTime) -> Self {
        self.sort_time = Some(sort_time);
        self
    }

    pub fn time_scope(&self) -> ScopeResult<TimeScope> {
        TimeScope::parse(&self.scope)
    }

    pub fn scope_source(&self) -> ScopeSource {
        ScopeSource {
            scope: Some(self.scope.clone()),
            instant: self.sort_time,
        }
    }

    pub fn order_key(&self) -> NoteOrder {
        (self.sort_time, self.created_at)
    }

    pub fn in_domain(&self, prefix: &str) -> bool {
        self.domain.starts_with(prefix)
    }
}

/// A stapler over notes, optionally restricted to domains starting with
/// `domain_prefix`. Works for owned notes and for `&Note`.
pub fn note_stapler<'a, N: Borrow<Note> + 'a>(
    config: StaplerConfig,
    domain_prefix: Option<&'a str>,
) -> Stapler<'a, N, NoteOrder> {
    let stapler = Stapler::new(
        config,
        |note: &N| note.borrow().scope_source(),
        |note: &N| note.borrow().order_key(),
    );
    match domain_prefix {
        Some(prefix) => stapler.with_filter(move |note: &N| note.borrow().in_domain(prefix)),
        None => stapler,
    }
}

fn new_note_id(now: DateTime<Utc>) -> String {
    let short = Uuid::new_v4().simple().to_string();
    format!(
        "note_{}_{}_{}",
        now.format("%Y%m%d"),
        now.format("%H%M%S"),
        &short[..4]
    )
}
