//! Question and answer channel between the session and the operator

use std::collections::VecDeque;
use std::io::{self, BufRead, Write};

/// Where the session's questions go and its answers come from
pub trait AnswerSource {
    /// Ask `question`; None means the input is closed
    fn ask(&mut self, question: &str) -> Option<String>;

    /// Show an informational line
    fn say(&mut self, line: &str);
}

/// Terminal-backed answers
pub struct StdinAnswers {
    stdin: io::Stdin,
    stdout: io::Stdout,
}

impl StdinAnswers {
    pub fn new() -> Self {
        Self {
            stdin: io::stdin(),
            stdout: io::stdout(),
        }
    }
}

impl Default for StdinAnswers {
    fn default() -> Self {
        Self::new()
    }
}

impl AnswerSource for StdinAnswers {
    fn ask(&mut self, question: &str) -> Option<String> {
        let mut out = self.stdout.lock();
        let _ = write!(out, "{}", question);
        let _ = out.flush();

        let mut line = String::new();
        match self.stdin.lock().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim_end_matches(['\r', '\n']).to_string()),
        }
    }

    fn say(&mut self, line: &str) {
        println!("{}", line);
    }
}

/// A fixed script of answers, recording everything asked and shown
#[derive(Debug, Default)]
pub struct ScriptedAnswers {
    answers: VecDeque<String>,
    questions: Vec<String>,
    output: Vec<String>,
}

impl ScriptedAnswers {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn questions(&self) -> &[String] {
        &self.questions
    }

    pub fn output(&self) -> &[String] {
        &self.output
    }

    /// Answers not consumed by the session
    pub fn remaining(&self) -> usize {
        self.answers.len()
    }
}

impl AnswerSource for ScriptedAnswers {
    fn ask(&mut self, question: &str) -> Option<String> {
        self.questions.push(question.to_string());
        self.answers.pop_front()
    }

    fn say(&mut self, line: &str) {
        self.output.push(line.to_string());
    }
}
