use std::{
    borrow::Cow,
    cmp::{Ordering, Reverse},
    collections::BinaryHeap,
    fmt,
    iter::FromIterator,
};

use itertools::Itertools;

/// A word and the number of times it has been seen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordCount {
    pub word: String,
    pub occurrences: u64,
}

impl WordCount {
    pub fn new(word: impl Into<String>, occurrences: u64) -> Self {
        Self {
            word: word.into(),
            occurrences,
        }
    }

    /// Ranking key: larger counts first, then ascending word.
    fn rank_key(&self) -> (Reverse<u64>, &str) {
        (Reverse(self.occurrences), &self.word)
    }
}

impl fmt::Display for WordCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>30} - {}", self.word, thousands(self.occurrences))
    }
}

/// Formats `n` with `,` between groups of three digits.
pub fn thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Word counts kept strictly increasing by word, one entry per word.
///
/// This is the growing form of a table: it only accepts inserts and merges.
/// Anything ordered by occurrences goes through [`FrequencyTable::ranked`],
/// which leaves this table untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrequencyTable {
    entries: Vec<WordCount>,
}

impl FrequencyTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, WordCount> {
        self.entries.iter()
    }

    pub fn get(&self, word: &str) -> Option<u64> {
        self.entries
            .binary_search_by(|e| e.word.as_str().cmp(word))
            .ok()
            .map(|i| self.entries[i].occurrences)
    }

    /// Sum of all occurrences.
    pub fn total(&self) -> u64 {
        self.entries.iter().map(|e| e.occurrences).sum()
    }

    /// Finds `word` by binary search and bumps it by `count`, inserting it
    /// at its sorted position when missing. Returns the entry's index.
    pub fn insert_or_increment_binary(&mut self, word: &str, count: u64) -> usize {
        let word = single_line(word);
        let word: &str = &word;
        match self.entries.binary_search_by(|e| e.word.as_str().cmp(word)) {
            Ok(i) => {
                self.entries[i].occurrences += count;
                i
            }
            Err(i) => {
                self.entries.insert(i, WordCount::new(word, count));
                i
            }
        }
    }

    /// Like [`insert_or_increment_binary`](Self::insert_or_increment_binary)
    /// but scans forward from `hint`.
    ///
    /// Feeding words in ascending order and passing the previous index + 1
    /// makes a whole batch a single pass over the table. A hint that is past
    /// `word`'s position falls back to the binary search.
    pub fn insert_or_increment_from(&mut self, word: &str, count: u64, hint: usize) -> usize {
        let word = single_line(word);
        let word: &str = &word;
        let start = hint.min(self.entries.len());
        if start > 0 && self.entries[start - 1].word.as_str() >= word {
            return self.insert_or_increment_binary(word, count);
        }

        for i in start..self.entries.len() {
            match self.entries[i].word.as_str().cmp(word) {
                Ordering::Less => continue,
                Ordering::Equal => {
                    self.entries[i].occurrences += count;
                    return i;
                }
                Ordering::Greater => {
                    self.entries.insert(i, WordCount::new(word, count));
                    return i;
                }
            }
        }
        self.entries.push(WordCount::new(word, count));
        self.entries.len() - 1
    }

    /// Counts every word of one batch, e.g. all body words of a document.
    pub fn add_many<I, S>(&mut self, words: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let batch = words
            .into_iter()
            .map(|w| single_line(w.as_ref()).into_owned())
            .sorted()
            .dedup_with_count();

        let mut hint = 0;
        for (count, word) in batch {
            hint = self.insert_or_increment_from(&word, count as u64, hint) + 1;
        }
    }

    /// Folds `other` into `self`, summing counts of shared words.
    pub fn merge(&mut self, other: &FrequencyTable) {
        self.entries.reserve(other.len());
        let mut hint = 0;
        for entry in &other.entries {
            hint = self.insert_or_increment_from(&entry.word, entry.occurrences, hint) + 1;
        }
    }

    /// The `k` most frequent entries, ties going to the smaller word.
    pub fn top_k(&self, k: usize) -> Vec<WordCount> {
        if k == 0 {
            return Vec::new();
        }

        // max-heap on the rank key keeps the worst candidate on top
        let mut heap = BinaryHeap::with_capacity(k.min(self.len()) + 1);
        for entry in &self.entries {
            heap.push(entry.rank_key());
            if heap.len() > k {
                heap.pop();
            }
        }

        heap.into_sorted_vec()
            .into_iter()
            .map(|(Reverse(occurrences), word)| WordCount::new(word, occurrences))
            .collect()
    }

    /// A copy ordered by occurrences. The table itself keeps growing.
    pub fn ranked(&self) -> RankedTable {
        self.clone().into_ranked()
    }

    pub fn into_ranked(self) -> RankedTable {
        let mut entries = self.entries;
        entries.sort_by(|a, b| a.rank_key().cmp(&b.rank_key()));
        RankedTable { entries }
    }

    /// Appends when `word` sorts after the last entry, otherwise falls back
    /// to a binary search. Input that is already in order stays linear.
    pub(crate) fn push_or_fold(&mut self, word: &str, count: u64) {
        match self.entries.last() {
            Some(last) if last.word.as_str() >= word => {
                self.insert_or_increment_binary(word, count);
            }
            _ => self.entries.push(WordCount::new(word, count)),
        }
    }
}

/// Line breaks would split a word across lines of the text format, so they
/// become single spaces and are trimmed from the ends.
fn single_line(word: &str) -> Cow<'_, str> {
    if !word.contains(|c: char| c == '\n' || c == '\r') {
        return Cow::Borrowed(word);
    }
    Cow::Owned(
        word.split(|c: char| c == '\n' || c == '\r')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .join(" "),
    )
}

impl<'a> IntoIterator for &'a FrequencyTable {
    type Item = &'a WordCount;
    type IntoIter = std::slice::Iter<'a, WordCount>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<S: AsRef<str>> FromIterator<S> for FrequencyTable {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut table = Self::new();
        table.add_many(iter);
        table
    }
}

/// Word counts ordered by descending occurrences, ties by ascending word.
///
/// Read-only: the word order needed for inserts is gone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedTable {
    entries: Vec<WordCount>,
}

impl RankedTable {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, WordCount> {
        self.entries.iter()
    }

    pub fn top(&self, k: usize) -> &[WordCount] {
        &self.entries[..k.min(self.entries.len())]
    }
}

impl<'a> IntoIterator for &'a RankedTable {
    type Item = &'a WordCount;
    type IntoIter = std::slice::Iter<'a, WordCount>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
