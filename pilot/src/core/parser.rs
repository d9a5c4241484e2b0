//! Tagged-reply parsing for policy responses.
//!
//! The policy is an unreliable text producer: every extraction here is
//! independently optional and unrecognized text maps to `None`, never to an
//! error. The declaration grammar is deliberately narrow: two known forms.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::core::subtask::SubtaskState;

/// Actions the decision policy's instruction set offers.
///
/// The label vocabulary additionally recognizes `[WAIT]`; the two sets are
/// kept separate (see [`crate::core::label`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Forward,
    LeftRotate,
    RightRotate,
    Stop,
}

impl Action {
    pub fn token(self) -> &'static str {
        match self {
            Self::Forward => "[FORWARD]",
            Self::LeftRotate => "[LEFT ROTATE]",
            Self::RightRotate => "[RIGHT ROTATE]",
            Self::Stop => "[STOP]",
        }
    }

    /// Parse the bracketed token emitted inside an `<action>` tag.
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim() {
            "[FORWARD]" => Some(Self::Forward),
            "[LEFT ROTATE]" => Some(Self::LeftRotate),
            "[RIGHT ROTATE]" => Some(Self::RightRotate),
            "[STOP]" => Some(Self::Stop),
            _ => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Raw tag contents extracted from a policy reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedReply {
    pub thought: Option<String>,
    pub action: Option<String>,
    pub state: Option<String>,
}

static THOUGHT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<thought>\s*(.*?)\s*</thought>").unwrap());
static ACTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<action>\s*(.*?)\s*</action>").unwrap());
static STATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<state>\s*(.*?)\s*</state>").unwrap());

/// Extract the three tagged sections. A missing tag yields `None` for that
/// field only.
pub fn extract_reply(text: &str) -> ParsedReply {
    let capture = |re: &Regex| {
        re.captures(text)
            .map(|caps| caps.get(1).unwrap().as_str().to_string())
    };
    ParsedReply {
        thought: capture(&THOUGHT_RE),
        action: capture(&ACTION_RE),
        state: capture(&STATE_RE),
    }
}

/// A policy-declared subtask-state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateDeclaration {
    /// "Subtask NO.N keeps state of S": no change this tick.
    Keep,
    /// "Subtask NO.N changes from S_old to S_new".
    Change {
        step: u32,
        from: SubtaskState,
        to: SubtaskState,
    },
}

static CHANGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"NO\.(\d+)\s+changes from (\w+)\s+to (\w+)").unwrap());

/// Parse a `<state>` tag body. Recognizes exactly the two declaration forms;
/// anything else (including unknown state words) yields `None`.
pub fn parse_declaration(text: &str) -> Option<StateDeclaration> {
    if let Some(caps) = CHANGE_RE.captures(text) {
        let step: u32 = caps.get(1).unwrap().as_str().parse().ok()?;
        let from = SubtaskState::parse(caps.get(2).unwrap().as_str())?;
        let to = SubtaskState::parse(caps.get(3).unwrap().as_str())?;
        return Some(StateDeclaration::Change { step, from, to });
    }
    if text.contains("keep") {
        return Some(StateDeclaration::Keep);
    }
    None
}
