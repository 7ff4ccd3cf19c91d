//! Category classification and template selection.

use crate::config::CategoryRule;

/// Ordered keyword rules; the first rule whose keyword is contained in an
/// identifier wins.
#[derive(Debug, Clone)]
pub struct Classifier {
    rules: Vec<CategoryRule>,
}

/// Template picked for one injection run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemplateChoice {
    /// Index into the rule list
    pub rule_index: usize,
    /// No row matched any rule; the first rule was used as default
    pub degraded: bool,
}

impl Classifier {
    pub fn new(rules: Vec<CategoryRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[CategoryRule] {
        &self.rules
    }

    /// Index of the first rule whose keyword appears in `identifier`.
    pub fn classify(&self, identifier: &str) -> Option<usize> {
        self.rules
            .iter()
            .position(|rule| !rule.keyword.is_empty() && identifier.contains(&rule.keyword))
    }

    /// Rows containing each rule's keyword, counted per rule independently.
    pub fn category_counts<'a, I>(&self, identifiers: I) -> Vec<usize>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut counts = vec![0; self.rules.len()];
        for identifier in identifiers {
            for (count, rule) in counts.iter_mut().zip(&self.rules) {
                if !rule.keyword.is_empty() && identifier.contains(&rule.keyword) {
                    *count += 1;
                }
            }
        }
        counts
    }

    /// Highest count wins, ties go to the earlier rule.
    pub fn choose_template(&self, counts: &[usize]) -> TemplateChoice {
        let mut best: Option<(usize, usize)> = None;
        for (index, &count) in counts.iter().enumerate() {
            if count == 0 {
                continue;
            }
            match best {
                Some((_, best_count)) if best_count >= count => {}
                _ => best = Some((index, count)),
            }
        }

        match best {
            Some((rule_index, _)) => TemplateChoice {
                rule_index,
                degraded: false,
            },
            None => TemplateChoice {
                rule_index: 0,
                degraded: true,
            },
        }
    }
}

/// `<prefixes sorted, deduplicated, joined by _>_<suffix>`, or `fallback`
/// when no prefix was used.
pub fn output_base_name<S: AsRef<str>>(prefixes: &[S], suffix: &str, fallback: &str) -> String {
    let mut used: Vec<&str> = prefixes.iter().map(AsRef::as_ref).collect();
    used.sort_unstable();
    used.dedup();

    if used.is_empty() {
        return fallback.to_string();
    }
    if suffix.is_empty() {
        return used.join("_");
    }
    format!("{}_{}", used.join("_"), suffix)
}
