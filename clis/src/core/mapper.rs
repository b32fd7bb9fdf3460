//! Ordered pattern tables that map raw client error text to canonical kinds.
//!
//! Each client owns one [`ExceptionMapper`], built once and never mutated.
//! Classification is first-match-wins: every substring rule is tried in
//! declaration order, then every regex rule in declaration order. There is no
//! scoring across rules, so table order is part of a client's behavior.

use anyhow::{Context, Result, bail};
use regex::Regex;

use crate::core::exceptions::ExceptionKind;

/// How a rule's pattern is matched against raw text.
#[derive(Debug, Clone)]
pub enum MatchRule {
    /// Pattern must appear verbatim somewhere in the text.
    Substring(String),
    /// Pattern must match somewhere in the text (unanchored). `sample` is a
    /// representative message the regex accepts.
    Regex { regex: Regex, sample: String },
}

impl MatchRule {
    pub fn pattern(&self) -> &str {
        match self {
            Self::Substring(pattern) => pattern,
            Self::Regex { regex, .. } => regex.as_str(),
        }
    }

    /// A message this rule accepts: the literal itself, or the regex sample.
    pub fn sample(&self) -> &str {
        match self {
            Self::Substring(pattern) => pattern,
            Self::Regex { sample, .. } => sample,
        }
    }

    fn matches(&self, text: &str) -> bool {
        match self {
            Self::Substring(pattern) => text.contains(pattern.as_str()),
            Self::Regex { regex, .. } => regex.is_match(text),
        }
    }
}

/// One `(kind, pattern)` entry of a client table.
#[derive(Debug, Clone)]
pub struct PatternRule {
    pub kind: ExceptionKind,
    pub rule: MatchRule,
}

/// A rule that can never win classification for its own literal message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShadowedRule {
    pub kind: ExceptionKind,
    pub pattern: String,
    pub shadowed_by: ExceptionKind,
}

/// Immutable, ordered rule table for one client.
#[derive(Debug, Clone)]
pub struct ExceptionMapper {
    client: &'static str,
    substring_rules: Vec<PatternRule>,
    regex_rules: Vec<PatternRule>,
}

/// Collects rules in declaration order; regexes are compiled by [`build`].
///
/// [`build`]: ExceptionMapperBuilder::build
#[derive(Debug)]
pub struct ExceptionMapperBuilder {
    client: &'static str,
    substrings: Vec<(ExceptionKind, String)>,
    regexes: Vec<(ExceptionKind, String, String)>,
}

impl ExceptionMapperBuilder {
    pub fn substring(mut self, kind: impl Into<ExceptionKind>, pattern: &str) -> Self {
        self.substrings.push((kind.into(), pattern.to_string()));
        self
    }

    /// `sample` must be a message `pattern` matches.
    pub fn regex(mut self, kind: impl Into<ExceptionKind>, pattern: &str, sample: &str) -> Self {
        self.regexes
            .push((kind.into(), pattern.to_string(), sample.to_string()));
        self
    }

    /// Fails if any regex does not compile or rejects its own sample.
    pub fn build(self) -> Result<ExceptionMapper> {
        let client = self.client;
        let substring_rules = self
            .substrings
            .into_iter()
            .map(|(kind, pattern)| PatternRule {
                kind,
                rule: MatchRule::Substring(pattern),
            })
            .collect();
        let regex_rules = self
            .regexes
            .into_iter()
            .map(|(kind, pattern, sample)| {
                let regex = Regex::new(&pattern)
                    .with_context(|| format!("compile {client} pattern {pattern:?}"))?;
                if !regex.is_match(&sample) {
                    bail!("{client} pattern {pattern:?} does not match its sample {sample:?}");
                }
                Ok(PatternRule {
                    kind,
                    rule: MatchRule::Regex { regex, sample },
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(ExceptionMapper {
            client,
            substring_rules,
            regex_rules,
        })
    }
}

impl ExceptionMapper {
    pub fn builder(client: &'static str) -> ExceptionMapperBuilder {
        ExceptionMapperBuilder {
            client,
            substrings: Vec::new(),
            regexes: Vec::new(),
        }
    }

    pub fn client(&self) -> &'static str {
        self.client
    }

    /// All rules in match order: substrings first, then regexes.
    pub fn rules(&self) -> impl Iterator<Item = &PatternRule> {
        self.substring_rules.iter().chain(self.regex_rules.iter())
    }

    /// Map raw client output to a canonical kind, or `None` when unknown.
    pub fn classify(&self, raw: &str) -> Option<ExceptionKind> {
        self.first_match(raw).map(|(_, rule)| rule.kind)
    }

    fn first_match(&self, raw: &str) -> Option<(usize, &PatternRule)> {
        self.rules()
            .enumerate()
            .find(|(_, rule)| rule.rule.matches(raw))
    }

    /// Rules whose own sample message is claimed by an earlier rule of a
    /// different kind.
    ///
    /// Substring rules are probed with their literal, regex rules with their
    /// sample. Every earlier rule counts, so a substring can shadow a regex.
    pub fn shadowed_rules(&self) -> Vec<ShadowedRule> {
        self.rules()
            .enumerate()
            .filter_map(|(index, rule)| {
                let (winner_index, winner) = self.first_match(rule.rule.sample())?;
                (winner_index != index && winner.kind != rule.kind).then(|| ShadowedRule {
                    kind: rule.kind,
                    pattern: rule.rule.pattern().to_string(),
                    shadowed_by: winner.kind,
                })
            })
            .collect()
    }
}
