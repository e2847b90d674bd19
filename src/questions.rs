//! Question bank
//!
//! Teams of related questions loaded from `[{ "tid": ..., "team": [{ "id", "question", "answer"? }] }]`.
//! A team is analysed as a unit because later questions may depend on earlier answers.

use crate::error::{AgentError, Result};
use crate::response::lenient;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    #[serde(rename = "question")]
    pub text: String,
    #[serde(default, deserialize_with = "lenient")]
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    #[serde(rename = "tid")]
    pub id: String,
    #[serde(rename = "team")]
    pub questions: Vec<Question>,
}

/// Per-team export: `"问题{n}"` label to question text.
pub type SubmissionEntry = IndexMap<String, String>;

impl Team {
    pub fn question_label(position: usize) -> String {
        format!("问题{}", position)
    }

    pub fn to_submission_entry(&self) -> SubmissionEntry {
        self.questions
            .iter()
            .enumerate()
            .map(|(i, q)| (Self::question_label(i + 1), q.text.clone()))
            .collect()
    }

    /// The labelled question list as pretty JSON, used as the analysis prompt input.
    pub fn to_prompt_text(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.to_submission_entry())?)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Question> {
        self.questions.iter()
    }
}

impl<'a> IntoIterator for &'a Team {
    type Item = &'a Question;
    type IntoIter = std::slice::Iter<'a, Question>;

    fn into_iter(self) -> Self::IntoIter {
        self.questions.iter()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuestionBank {
    teams: Vec<Team>,
}

impl QuestionBank {
    pub fn new(teams: Vec<Team>) -> Self {
        Self { teams }
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading question bank from {:?}", path);
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let teams: Vec<Team> = serde_json::from_str(text)
            .map_err(|e| AgentError::QuestionBank(format!("Invalid question bank: {}", e)))?;
        debug!("Loaded {} teams", teams.len());
        Ok(Self { teams })
    }

    pub fn len(&self) -> usize {
        self.teams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.teams.is_empty()
    }

    pub fn team(&self, index: usize) -> Option<&Team> {
        self.teams.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Team> {
        self.teams.iter()
    }

    pub fn get_team(&self, tid: &str) -> Option<&Team> {
        self.teams.iter().find(|t| t.id == tid)
    }

    pub fn get_question(&self, qid: &str) -> Option<&Question> {
        self.teams
            .iter()
            .flat_map(|t| t.questions.iter())
            .find(|q| q.id == qid)
    }

    pub fn get_question_mut(&mut self, qid: &str) -> Option<&mut Question> {
        self.teams
            .iter_mut()
            .flat_map(|t| t.questions.iter_mut())
            .find(|q| q.id == qid)
    }

    /// Lossy export: ids and answers are not part of the submission shape.
    pub fn to_submission_document(&self) -> Vec<SubmissionEntry> {
        self.teams.iter().map(Team::to_submission_entry).collect()
    }

    /// Write the submission document with a 4-space indent, keeping non-ASCII text as is.
    pub fn export_submission(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.to_submission_document().serialize(&mut ser)?;
        std::fs::write(path, buf)?;
        info!("Submission written to {:?}", path);
        Ok(())
    }
}

impl<'a> IntoIterator for &'a QuestionBank {
    type Item = &'a Team;
    type IntoIter = std::slice::Iter<'a, Team>;

    fn into_iter(self) -> Self::IntoIter {
        self.teams.iter()
    }
}
