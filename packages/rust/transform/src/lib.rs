//! Text transform port.
//!
//! The pipeline treats the transformation itself (translation, rewriting, ...)
//! as an opaque capability behind [`TransformPort`]. Implementations:
//! - [`SentenceChunked`] over any [`UnitModel`], which splits oversize input on
//!   sentence boundaries before handing it to the model
//! - [`BridgeModel`], a model living in an external process
//! - [`Passthrough`], which returns text unchanged

mod bridge;
mod chunked;

pub use bridge::{BridgeConfig, BridgeModel};
pub use chunked::{SentenceChunked, split_sentences};

use folio_shared::Result;

/// Transform one paragraph of text.
pub trait TransformPort {
    /// Return the transformed `text`.
    ///
    /// `max_unit_length` is the largest input, in model units, that may be
    /// transformed in one piece.
    fn transform(&mut self, text: &str, max_unit_length: usize) -> Result<String>;
}

/// A model that transforms bounded units of text.
pub trait UnitModel {
    /// Length of `text` in model units. Whitespace tokens by default.
    fn unit_count(&self, text: &str) -> usize {
        text.split_whitespace().count()
    }

    /// Transform a single unit.
    fn transform_unit(&mut self, text: &str) -> Result<String>;
}

/// Identity transform.
#[derive(Debug, Default, Clone, Copy)]
pub struct Passthrough;

impl TransformPort for Passthrough {
    fn transform(&mut self, text: &str, _max_unit_length: usize) -> Result<String> {
        Ok(text.to_string())
    }
}

impl<T: TransformPort + ?Sized> TransformPort for Box<T> {
    fn transform(&mut self, text: &str, max_unit_length: usize) -> Result<String> {
        (**self).transform(text, max_unit_length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passthrough_returns_input() {
        let mut port = Passthrough;
        assert_eq!(port.transform("Hello there.", 1).unwrap(), "Hello there.");
    }

    #[test]
    fn boxed_port_delegates() {
        let mut port: Box<dyn TransformPort> = Box::new(Passthrough);
        assert_eq!(port.transform("x", 4).unwrap(), "x");
    }
}
