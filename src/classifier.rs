//! Intent Classifier
//!
//! Maps free text onto at most one financial-question intent by walking an
//! ordered table of matchers. The first intent with a hit wins; overlapping
//! phrases are resolved by table order, never by specificity.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Intent {
    Greeting,
    Identity,
    TotalExpenses,
    LastMonthExpenses,
    CategoryExpenses,
    GroupCount,
    GroupMembers,
    GroupExpenses,
    OwedAmount,
    SettledAmount,
    // Classified, but never composed: these always reach the fallback path
    TimeComparison,
    TimePeriod,
    Advice,
    Calculation,
}

impl Intent {
    /// Intents the deterministic composer has no phrasing for.
    pub fn is_reserved(&self) -> bool {
        matches!(
            self,
            Intent::TimeComparison | Intent::TimePeriod | Intent::Advice | Intent::Calculation
        )
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Intent::Greeting => "GREETING",
            Intent::Identity => "IDENTITY",
            Intent::TotalExpenses => "TOTAL_EXPENSES",
            Intent::LastMonthExpenses => "LAST_MONTH_EXPENSES",
            Intent::CategoryExpenses => "CATEGORY_EXPENSES",
            Intent::GroupCount => "GROUP_COUNT",
            Intent::GroupMembers => "GROUP_MEMBERS",
            Intent::GroupExpenses => "GROUP_EXPENSES",
            Intent::OwedAmount => "OWED_AMOUNT",
            Intent::SettledAmount => "SETTLED_AMOUNT",
            Intent::TimeComparison => "TIME_COMPARISON",
            Intent::TimePeriod => "TIME_PERIOD",
            Intent::Advice => "ADVICE",
            Intent::Calculation => "CALCULATION",
        };
        write!(f, "{}", s)
    }
}

/// A single test against lower-cased query text
#[derive(Debug, Clone)]
pub enum Matcher {
    /// Case-insensitive substring
    Literal(String),
    /// Case-insensitive regular expression
    Pattern(Regex),
}

impl Matcher {
    pub fn literal(value: &str) -> Self {
        Matcher::Literal(value.to_lowercase())
    }

    /// Compile a pattern with case-insensitivity forced on.
    pub fn pattern(expr: &str) -> std::result::Result<Self, regex::Error> {
        Regex::new(&format!("(?i){}", expr)).map(Matcher::Pattern)
    }

    /// `lowered` must already be lower-cased.
    pub fn is_match(&self, lowered: &str) -> bool {
        match self {
            Matcher::Literal(needle) => lowered.contains(needle.as_str()),
            Matcher::Pattern(re) => re.is_match(lowered),
        }
    }
}

/// Static matcher lists, in evaluation order
const GREETING_LITERALS: &[&str] = &[
    "hi", "hello", "hey", "greetings", "howdy", "hola", "good morning", "good afternoon",
];

const INTENT_PATTERNS: &[(Intent, &[&str])] = &[
    (Intent::Identity, &[r"who am i", r"what's my name"]),
    (
        Intent::TotalExpenses,
        &[r"total expen(s|d)", r"how much (have|did) i spend", r"overall spending"],
    ),
    (
        Intent::LastMonthExpenses,
        &[r"last month", r"previous month", r"month before"],
    ),
    (
        Intent::CategoryExpenses,
        &[r"categor(y|ies)", r"breakdown", r"by type", r"spending on (\w+)"],
    ),
    (
        Intent::GroupCount,
        &[r"how many groups", r"number of groups", r"group count"],
    ),
    (
        Intent::GroupMembers,
        &[r"group members", r"how many people in groups", r"total members"],
    ),
    (
        Intent::GroupExpenses,
        &[r"group expen(s|d)", r"spending in groups"],
    ),
    (
        Intent::OwedAmount,
        &[r"how much (do|does) i owe", r"my debt", r"who do i need to pay"],
    ),
    (
        Intent::SettledAmount,
        &[r"how much (have|did) i settled", r"paid back", r"settlement amount"],
    ),
    (
        Intent::TimeComparison,
        &[r"compare (spending|expenses)", r"(more|less) than (last|previous)"],
    ),
    (
        Intent::TimePeriod,
        &[
            r"in (january|february|march|april|may|june|july|august|september|october|november|december)",
            r"last week",
            r"this month",
            r"last \d+ months",
        ],
    ),
    (
        Intent::Advice,
        &[r"how (can|do) i reduce", r"sav(e|ing) advice", r"cut back"],
    ),
    (
        Intent::Calculation,
        &[r"percentage", r"average", r"per (day|month|year)", r"calculate"],
    ),
];

lazy_static! {
    static ref DEFAULT_TABLE: IntentTable = IntentTable::default_table();
}

/// Ordered `(intent, matchers)` table
#[derive(Debug, Clone)]
pub struct IntentTable {
    entries: Vec<(Intent, Vec<Matcher>)>,
}

impl IntentTable {
    pub fn new(entries: Vec<(Intent, Vec<Matcher>)>) -> Self {
        Self { entries }
    }

    fn default_table() -> Self {
        let mut entries = Vec::with_capacity(INTENT_PATTERNS.len() + 1);

        entries.push((
            Intent::Greeting,
            GREETING_LITERALS.iter().map(|s| Matcher::literal(s)).collect(),
        ));

        for (intent, patterns) in INTENT_PATTERNS {
            let matchers = patterns
                .iter()
                // Table patterns are compile-time constants covered by tests
                .filter_map(|p| Matcher::pattern(p).ok())
                .collect();
            entries.push((*intent, matchers));
        }

        Self { entries }
    }

    /// Intents in evaluation order
    pub fn order(&self) -> impl Iterator<Item = Intent> + '_ {
        self.entries.iter().map(|(intent, _)| *intent)
    }

    /// Return the first intent whose matcher set hits `text`.
    pub fn classify(&self, text: &str) -> Option<Intent> {
        let lowered = text.to_lowercase();

        self.entries
            .iter()
            .find(|(_, matchers)| matchers.iter().any(|m| m.is_match(&lowered)))
            .map(|(intent, _)| *intent)
    }
}

/// Intent classifier over the process-wide default table
pub struct IntentClassifier;

impl IntentClassifier {
    pub fn classify(text: &str) -> Option<Intent> {
        DEFAULT_TABLE.classify(text)
    }

    pub fn table() -> &'static IntentTable {
        &DEFAULT_TABLE
    }
}
