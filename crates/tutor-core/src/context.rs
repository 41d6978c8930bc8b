//! Per-conversation student state and the session notebook

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::runner::RunContext;

/// State shared by every agent and tool in one tutoring conversation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentContext {
    #[serde(default)]
    pub student_name: Option<String>,
    #[serde(default)]
    pub current_subject: Option<String>,
    #[serde(default)]
    pub study_session_notes: Vec<String>,
}

impl StudentContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the student's name
    pub fn with_student_name(mut self, name: impl Into<String>) -> Self {
        self.student_name = Some(name.into());
        self
    }

    /// Seed the subject the student is currently working on
    pub fn with_current_subject(mut self, subject: impl Into<String>) -> Self {
        self.current_subject = Some(subject.into());
        self
    }

    /// Append a note to the notebook and return the confirmation text
    pub fn add_note(&mut self, note: impl Into<String>) -> String {
        let note = note.into();
        let confirmation = format!("Added note: {}", note);
        self.study_session_notes.push(note);
        debug!("Notebook now holds {} notes", self.study_session_notes.len());
        confirmation
    }

    pub fn notes(&self) -> &[String] {
        &self.study_session_notes
    }

    /// Lines printed at the end of a session: numbered notes, or a placeholder
    pub fn summary_lines(&self) -> Vec<String> {
        if self.study_session_notes.is_empty() {
            return vec!["No notes were taken this session.".to_string()];
        }
        self.study_session_notes
            .iter()
            .enumerate()
            .map(|(i, note)| format!("{}. {}", i + 1, note))
            .collect()
    }
}

impl RunContext for StudentContext {
    fn prompt_context(&self) -> Option<String> {
        if self.student_name.is_none() && self.current_subject.is_none() {
            return None;
        }

        let mut context = String::new();
        if let Some(name) = &self.student_name {
            context.push_str(&format!("Student name: {}\n", name));
        }
        if let Some(subject) = &self.current_subject {
            context.push_str(&format!("Current subject: {}\n", subject));
        }
        Some(context)
    }
}
