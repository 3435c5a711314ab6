//! Text layer reconstruction
//!
//! Turns the text runs of one rendered page into positioned, hit-testable
//! fragments in the device space of the page's raster. A layer is built in
//! one go and never patched: page or zoom changes produce a new layer.

use std::collections::HashMap;
use std::sync::LazyLock;

use log::debug;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::types::{TextFragment, TextRun, Viewport};

/// Average glyph advance, as a fraction of the font size, when a run has no
/// usable width
pub const FALLBACK_CHAR_WIDTH_EM: f32 = 0.6;

static WORD_SPLIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\S+|\s+").expect("static word split regex"));

/// Unit a run is split into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    /// Whitespace-delimited words; whitespace runs become their own fragments
    #[default]
    Word,
    /// One fragment per character
    Glyph,
}

/// Fragments of one page at one scale
#[derive(Clone, Debug)]
pub struct TextLayer {
    generation: u64,
    viewport: Viewport,
    granularity: Granularity,
    fragments: Vec<TextFragment>,
}

impl TextLayer {
    /// Monotonic build counter; a selection started on one generation is
    /// void on any other
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    #[must_use]
    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    /// Fragments in source order
    #[must_use]
    pub fn fragments(&self) -> &[TextFragment] {
        &self.fragments
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Text of all non-whitespace fragments, space separated
    #[must_use]
    pub fn plain_text(&self) -> String {
        self.fragments
            .iter()
            .filter(|f| !f.is_whitespace())
            .map(|f| f.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Builds [`TextLayer`]s
#[derive(Debug, Default)]
pub struct TextLayerBuilder {
    granularity: Granularity,
    builds: u64,
}

impl TextLayerBuilder {
    #[must_use]
    pub fn new(granularity: Granularity) -> Self {
        Self {
            granularity,
            builds: 0,
        }
    }

    #[must_use]
    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    /// Build a fresh layer from `runs` against `viewport`.
    ///
    /// `viewport` must be the one the page raster was produced with.
    pub fn build(&mut self, runs: &[TextRun], viewport: &Viewport) -> TextLayer {
        self.builds += 1;

        let mut fragments: Vec<TextFragment> = Vec::new();
        let mut cells: HashMap<(i64, i64), usize> = HashMap::new();

        for (run_index, run) in runs.iter().enumerate() {
            for candidate in split_run(run, run_index, viewport.scale, self.granularity) {
                match cells.get(&candidate.cell()) {
                    Some(&slot) => {
                        if fragments[slot].is_whitespace() && !candidate.is_whitespace() {
                            fragments[slot] = candidate;
                        }
                    }
                    None => {
                        cells.insert(candidate.cell(), fragments.len());
                        fragments.push(candidate);
                    }
                }
            }
        }

        debug!(
            "Built text layer #{} for page {} at scale {}: {} runs -> {} fragments",
            self.builds,
            viewport.page,
            viewport.scale,
            runs.len(),
            fragments.len()
        );

        TextLayer {
            generation: self.builds,
            viewport: *viewport,
            granularity: self.granularity,
            fragments,
        }
    }
}

/// Split one run into positioned candidates, before de-duplication
fn split_run(
    run: &TextRun,
    run_index: usize,
    scale: f32,
    granularity: Granularity,
) -> Vec<TextFragment> {
    let char_count = run.text.chars().count();
    if char_count == 0 {
        return Vec::new();
    }

    let (e, f) = run.origin();
    if !(e.is_finite() && f.is_finite()) {
        debug!("Skipping run {run_index} with non-finite origin");
        return Vec::new();
    }

    let font_size = run.font_height * scale;
    let left = e * scale;
    let top = f * scale - run.font_ascent * scale;
    let char_width = if run.run_width > 0.0 {
        run.run_width * scale / char_count as f32
    } else {
        font_size * FALLBACK_CHAR_WIDTH_EM
    };

    let pieces: Vec<&str> = match granularity {
        Granularity::Word => WORD_SPLIT.find_iter(&run.text).map(|m| m.as_str()).collect(),
        Granularity::Glyph => run
            .text
            .char_indices()
            .map(|(i, c)| &run.text[i..i + c.len_utf8()])
            .collect(),
    };

    let mut offset_chars = 0usize;
    pieces
        .into_iter()
        .map(|piece| {
            let len = piece.chars().count();
            let fragment = TextFragment {
                text: piece.to_string(),
                left: left + offset_chars as f32 * char_width,
                top,
                width: len as f32 * char_width,
                height: font_size,
                source_run_index: run_index,
                offset_in_run: offset_chars,
            };
            offset_chars += len;
            fragment
        })
        .collect()
}
