use colored::*;
use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;

use crate::command::Command;

/// A command name that matched, with its score and matched char positions.
#[derive(Debug, Clone)]
pub struct Ranked<'a> {
    pub command: &'a Command,
    pub score: i64,
    pub indices: Vec<usize>,
}

/// Ranks command names: prefix, then substring, then skim-style fuzzy.
pub struct CommandMatcher {
    matcher: SkimMatcherV2,
}

impl CommandMatcher {
    pub fn new() -> Self {
        Self {
            matcher: SkimMatcherV2::default().ignore_case(),
        }
    }

    fn literal_match(pattern: &str, text: &str) -> Option<(i64, Vec<usize>)> {
        let pattern = pattern.to_lowercase();
        let text = text.to_lowercase();
        let pos = text.find(&pattern)?;

        let start = text[..pos].chars().count();
        let indices = (start..start + pattern.chars().count()).collect();
        let weight = (pattern.chars().count() * 10) as i64;
        let score = if pos == 0 { 1200 + weight } else { 1000 + weight };
        Some((score, indices))
    }

    pub fn score(&self, pattern: &str, text: &str) -> Option<(i64, Vec<usize>)> {
        if pattern.is_empty() {
            return Some((0, Vec::new()));
        }
        Self::literal_match(pattern, text).or_else(|| self.matcher.fuzzy_indices(text, pattern))
    }

    /// Matching commands, best first; ties go to the shorter name, then list order.
    pub fn rank<'a>(&self, pattern: &str, commands: &'a [Command]) -> Vec<Ranked<'a>> {
        let mut results: Vec<Ranked<'a>> = commands
            .iter()
            .filter_map(|command| {
                self.score(pattern, &command.name).map(|(score, indices)| Ranked {
                    command,
                    score,
                    indices,
                })
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then_with(|| a.command.name.len().cmp(&b.command.name.len()))
        });
        results
    }

    pub fn highlight(text: &str, indices: &[usize]) -> String {
        text.chars()
            .enumerate()
            .map(|(i, c)| {
                if indices.contains(&i) {
                    c.to_string().red().bold().to_string()
                } else {
                    c.to_string()
                }
            })
            .collect()
    }
}

impl Default for CommandMatcher {
    fn default() -> Self {
        Self::new()
    }
}
