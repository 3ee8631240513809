//! Sentence-level re-chunking for models with a bounded input length.

use tracing::debug;

use folio_shared::Result;

use crate::{TransformPort, UnitModel};

/// Sentence boundary the splitter cuts on.
const SENTENCE_BOUNDARY: &str = ". ";

/// Split `text` on `". "`, dropping empty pieces.
pub fn split_sentences(text: &str) -> Vec<&str> {
    text.split(SENTENCE_BOUNDARY)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Adapts a [`UnitModel`] into a [`TransformPort`].
///
/// Text that fits in `max_unit_length` units goes to the model whole.
/// Longer text is split into sentences, each sentence is transformed on its
/// own, and the results are joined with single spaces.
#[derive(Debug)]
pub struct SentenceChunked<M> {
    model: M,
}

impl<M: UnitModel> SentenceChunked<M> {
    pub fn new(model: M) -> Self {
        Self { model }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn into_inner(self) -> M {
        self.model
    }
}

impl<M: UnitModel> TransformPort for SentenceChunked<M> {
    fn transform(&mut self, text: &str, max_unit_length: usize) -> Result<String> {
        let units = self.model.unit_count(text);
        if units <= max_unit_length {
            return self.model.transform_unit(text);
        }

        let sentences = split_sentences(text);
        debug!(
            units,
            max_unit_length,
            sentences = sentences.len(),
            "input exceeds unit limit, splitting on sentences"
        );

        let mut out = String::new();
        for sentence in sentences {
            let sentence_units = self.model.unit_count(sentence);
            if sentence_units > max_unit_length {
                debug!(sentence_units, max_unit_length, "single sentence exceeds unit limit");
            }
            out.push_str(&self.model.transform_unit(sentence)?);
            out.push(' ');
        }

        Ok(out.trim_end().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_shared::FolioError;

    /// Uppercases and records every unit it sees.
    #[derive(Default)]
    struct Recording {
        seen: Vec<String>,
        fail_on: Option<String>,
    }

    impl UnitModel for Recording {
        fn transform_unit(&mut self, text: &str) -> Result<String> {
            if self.fail_on.as_deref() == Some(text) {
                return Err(FolioError::Transform(format!("cannot transform {text:?}")));
            }
            self.seen.push(text.to_string());
            Ok(text.to_uppercase())
        }
    }

    #[test]
    fn short_text_is_sent_whole() {
        let mut port = SentenceChunked::new(Recording::default());
        let out = port.transform("One. Two. Three.", 10).unwrap();
        assert_eq!(out, "ONE. TWO. THREE.");
        assert_eq!(port.model().seen, ["One. Two. Three."]);
    }

    #[test]
    fn long_text_is_split_on_sentences() {
        let mut port = SentenceChunked::new(Recording::default());
        let out = port.transform("one two. three four. five", 2).unwrap();
        assert_eq!(port.model().seen, ["one two", "three four", "five"]);
        assert_eq!(out, "ONE TWO THREE FOUR FIVE");
    }

    #[test]
    fn empty_pieces_are_skipped() {
        assert_eq!(split_sentences("a. . b. "), ["a", "b"]);
        assert_eq!(split_sentences(". x"), ["x"]);
        assert!(split_sentences("").is_empty());
    }

    #[test]
    fn result_has_no_trailing_whitespace() {
        let mut port = SentenceChunked::new(Recording::default());
        let out = port.transform("a b. c d. ", 1).unwrap();
        assert_eq!(out, "A B C D");
    }

    #[test]
    fn sentence_failure_propagates() {
        let mut port = SentenceChunked::new(Recording {
            fail_on: Some("c d".into()),
            ..Default::default()
        });
        let err = port.transform("a b. c d. e f", 1).unwrap_err();
        assert!(matches!(err, FolioError::Transform(_)));
    }
}
