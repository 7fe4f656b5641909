//! Plain-text handoff format.
//!
//! A table is written as its entry count on one line followed by one
//! `word` line and one `occurrences` line per entry. A [`TableSet`] is its
//! three tables back to back: words, headings, title words.

use std::io::{self, BufRead, Write};

use thiserror::Error;

use crate::table::FrequencyTable;

#[derive(Error, Debug, PartialEq, Eq)]
#[error("malformed table at line {line}: {reason}")]
pub struct MalformedTable {
    /// 1-based line number within the source.
    pub line: usize,
    pub reason: String,
}

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error(transparent)]
    Malformed(#[from] MalformedTable),
    #[error("read failed: {0}")]
    Io(#[from] io::Error),
}

impl FrequencyTable {
    pub fn write_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "{}", self.len())?;
        for entry in self {
            writeln!(out, "{}\n{}", entry.word, entry.occurrences)?;
        }
        Ok(())
    }

    /// Reads one table from `lines`, leaving the rest of the source unread.
    pub fn read_from<I>(lines: &mut Lines<I>) -> Result<Self, DecodeError>
    where
        I: Iterator<Item = io::Result<String>>,
    {
        let declared = lines.next_required("entry count")?;
        let declared: usize = declared.trim().parse().map_err(|_| {
            lines.malformed(format!("entry count {:?} is not a number", declared))
        })?;

        // the count comes from disk, so don't trust it for the allocation
        let mut table = FrequencyTable::with_capacity(declared.min(1 << 16));
        for i in 0..declared {
            let word = lines.next_required(&format!("word {} of {}", i + 1, declared))?;
            let occurrences = lines.next_required(&format!("count {} of {}", i + 1, declared))?;
            let occurrences = match occurrences.trim().parse::<u64>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(lines
                        .malformed(format!(
                            "occurrences {:?} of {:?} is not a positive integer",
                            occurrences, word
                        ))
                        .into())
                }
            };
            table.push_or_fold(&word, occurrences);
        }
        Ok(table)
    }
}

/// Line reader that remembers its position for error reporting.
pub struct Lines<I> {
    inner: I,
    line: usize,
}

impl<I> Lines<I>
where
    I: Iterator<Item = io::Result<String>>,
{
    pub fn new(inner: I) -> Self {
        Self { inner, line: 0 }
    }

    fn next_line(&mut self) -> Result<Option<String>, io::Error> {
        match self.inner.next() {
            Some(line) => {
                self.line += 1;
                line.map(Some)
            }
            None => Ok(None),
        }
    }

    fn next_required(&mut self, what: &str) -> Result<String, DecodeError> {
        match self.next_line()? {
            Some(line) => Ok(line),
            None => Err(MalformedTable {
                line: self.line + 1,
                reason: format!("unexpected end of input, expected {}", what),
            }
            .into()),
        }
    }

    fn malformed(&self, reason: String) -> MalformedTable {
        MalformedTable {
            line: self.line,
            reason,
        }
    }

    /// Fails if anything other than blank lines remains.
    fn expect_end(&mut self) -> Result<(), DecodeError> {
        while let Some(line) = self.next_line()? {
            if !line.trim().is_empty() {
                return Err(self
                    .malformed(format!("trailing content {:?}", line))
                    .into());
            }
        }
        Ok(())
    }
}

/// The three tables a worker accumulates and the coordinator merges.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableSet {
    pub words: FrequencyTable,
    pub headings: FrequencyTable,
    pub titles: FrequencyTable,
}

impl TableSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge(&mut self, other: &TableSet) {
        self.words.merge(&other.words);
        self.headings.merge(&other.headings);
        self.titles.merge(&other.titles);
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty() && self.headings.is_empty() && self.titles.is_empty()
    }

    pub fn write_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        self.words.write_to(out)?;
        self.headings.write_to(out)?;
        self.titles.write_to(out)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        // writing into a Vec cannot fail
        let _ = self.write_to(&mut buf);
        buf
    }

    /// Decodes a whole source. Any defect rejects the entire set so that a
    /// damaged file never contributes a partial table.
    pub fn read_from<R: BufRead>(reader: R) -> Result<Self, DecodeError> {
        let mut lines = Lines::new(reader.lines());
        let words = FrequencyTable::read_from(&mut lines)?;
        let headings = FrequencyTable::read_from(&mut lines)?;
        let titles = FrequencyTable::read_from(&mut lines)?;
        lines.expect_end()?;
        Ok(Self {
            words,
            headings,
            titles,
        })
    }
}
