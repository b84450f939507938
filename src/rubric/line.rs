use std::fmt;

const SEPARATOR: char = ',';

/// One rubric entry, stored as its text form `"<question_number>, <criterion>"`.
///
/// Lines are kept as text because a rubric loaded from disk may contain
/// entries that do not parse; those are carried along untouched and simply
/// cannot be corrected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RubricLine {
    text: String,
}

impl RubricLine {
    pub fn new(question_number: usize, criterion: char) -> Self {
        Self {
            text: format!("{}{} {}", question_number, SEPARATOR, criterion),
        }
    }

    pub fn from_text(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Default rubric for `question_count` questions: `1, A`, `2, B`, ...
    pub fn defaults(question_count: usize) -> Vec<Self> {
        (0..question_count)
            .map(|i| {
                let criterion = char::from_u32('A' as u32 + i as u32).unwrap_or('A');
                Self::new(i + 1, criterion)
            })
            .collect()
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Question number before the separator, if it parses.
    pub fn question_number(&self) -> Option<usize> {
        let (number, _) = self.text.split_once(SEPARATOR)?;
        number.trim().parse().ok()
    }

    /// The criterion token: the character one space past the separator.
    pub fn criterion(&self) -> Option<char> {
        let (start, _) = self.criterion_position()?;
        self.text[start..].chars().next()
    }

    /// Advance the criterion by one step (`A` becomes `B`) and return the
    /// `(before, after)` pair. Returns `None`, leaving the line untouched, when
    /// the separator or the criterion is missing.
    pub fn advance_criterion(&mut self) -> Option<(char, char)> {
        let (start, before) = self.criterion_position()?;
        let after = char::from_u32(before as u32 + 1)?;
        self.text
            .replace_range(start..start + before.len_utf8(), after.encode_utf8(&mut [0; 4]));
        Some((before, after))
    }

    fn criterion_position(&self) -> Option<(usize, char)> {
        let separator = self.text.find(SEPARATOR)?;
        // Skip the separator and the single space after it.
        let mut rest = self.text[separator..].char_indices().skip(2);
        let (offset, criterion) = rest.next()?;
        Some((separator + offset, criterion))
    }
}

impl fmt::Display for RubricLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
