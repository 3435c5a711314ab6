//! Text selection over a [`TextLayer`]
//!
//! Two gestures are supported: a freeform drag rectangle and a native
//! selection range reported by the host. The drag gesture is a small state
//! machine (`Idle -> Selecting -> Idle`); highlight state is never stored, it
//! is recomputed from the in-flight region on demand.

use log::debug;
use serde::Serialize;

use super::text_layer::{Granularity, TextLayer};
use super::types::{Rect, TextFragment, bounding_rect};

/// Share of a fragment's own area the drag region must cover
pub const DEFAULT_OVERLAP_THRESHOLD: f32 = 0.35;

/// Selection tuning knobs
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SelectionConfig {
    pub overlap_threshold: f32,
    /// Runs of one repeated character at least this long are shortened
    pub collapse_min_run: usize,
    /// Length the shortened runs are cut to
    pub collapse_keep: usize,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            overlap_threshold: DEFAULT_OVERLAP_THRESHOLD,
            collapse_min_run: 3,
            collapse_keep: 2,
        }
    }
}

/// In-flight drag rectangle
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SelectionRegion {
    pub origin_x: f32,
    pub origin_y: f32,
    pub current_x: f32,
    pub current_y: f32,
}

impl SelectionRegion {
    #[must_use]
    pub fn at(x: f32, y: f32) -> Self {
        Self {
            origin_x: x,
            origin_y: y,
            current_x: x,
            current_y: y,
        }
    }

    #[must_use]
    pub fn rect(&self) -> Rect {
        Rect::from_points(self.origin_x, self.origin_y, self.current_x, self.current_y)
    }
}

/// Outcome of a completed gesture
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Selection {
    pub text: String,
    pub fragments: Vec<TextFragment>,
    pub bounding_rect: Rect,
}

/// Host-reported selection between two fragments, in source order indices
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NativeRange {
    pub anchor: usize,
    pub focus: usize,
}

#[derive(Clone, Debug, Default, PartialEq)]
enum TrackerState {
    #[default]
    Idle,
    Selecting {
        region: SelectionRegion,
        generation: u64,
    },
}

/// Interprets selection gestures against the current text layer
#[derive(Debug, Default)]
pub struct SelectionTracker {
    config: SelectionConfig,
    state: TrackerState,
}

impl SelectionTracker {
    #[must_use]
    pub fn new(config: SelectionConfig) -> Self {
        Self {
            config,
            state: TrackerState::Idle,
        }
    }

    #[must_use]
    pub fn config(&self) -> &SelectionConfig {
        &self.config
    }

    #[must_use]
    pub fn is_selecting(&self) -> bool {
        matches!(self.state, TrackerState::Selecting { .. })
    }

    /// Current drag region, if a gesture is in flight
    #[must_use]
    pub fn region(&self) -> Option<SelectionRegion> {
        match self.state {
            TrackerState::Selecting { region, .. } => Some(region),
            TrackerState::Idle => None,
        }
    }

    /// Start a drag. Any gesture still in flight is discarded first.
    pub fn pointer_down(&mut self, layer: &TextLayer, x: f32, y: f32) {
        if self.is_selecting() {
            debug!("New pointer-down supersedes in-flight selection");
        }
        self.state = TrackerState::Selecting {
            region: SelectionRegion::at(x, y),
            generation: layer.generation(),
        };
    }

    /// Extend the drag and return the indices to highlight
    pub fn pointer_move(&mut self, layer: &TextLayer, x: f32, y: f32) -> Vec<usize> {
        if !self.track(layer, x, y) {
            return Vec::new();
        }
        self.highlighted(layer)
    }

    /// Finish the drag. Returns `None` when nothing was overlapped.
    pub fn pointer_up(&mut self, layer: &TextLayer, x: f32, y: f32) -> Option<Selection> {
        if !self.track(layer, x, y) {
            return None;
        }
        let hits = self.highlighted(layer);
        self.state = TrackerState::Idle;

        let selected = document_order(layer.fragments(), hits);
        let selection = make_selection(&selected, layer.granularity());
        if selection.is_none() {
            debug!("Drag selection overlapped no fragments");
        }
        selection
    }

    /// Drop an in-flight gesture without producing a result
    pub fn cancel(&mut self) {
        self.state = TrackerState::Idle;
    }

    /// Fragment indices (source order) the in-flight region currently
    /// selects. Empty when idle or when `layer` is not the gesture's layer.
    #[must_use]
    pub fn highlighted(&self, layer: &TextLayer) -> Vec<usize> {
        let TrackerState::Selecting { region, generation } = &self.state else {
            return Vec::new();
        };
        if *generation != layer.generation() {
            return Vec::new();
        }
        fragments_in_rect(layer, &region.rect(), self.config.overlap_threshold)
    }

    /// Resolve a host selection range into a [`Selection`].
    ///
    /// Fragments between the two ends are taken in source order and the
    /// repeated-character cleanup is applied to the joined text.
    #[must_use]
    pub fn select_native(&self, layer: &TextLayer, range: NativeRange) -> Option<Selection> {
        let last = layer.len().checked_sub(1)?;
        let start = range.anchor.min(range.focus).min(last);
        let end = range.anchor.max(range.focus).min(last);

        let selected: Vec<&TextFragment> = layer.fragments()[start..=end].iter().collect();
        let mut selection = make_selection(&selected, layer.granularity())?;
        selection.text = collapse_repeats(
            &selection.text,
            self.config.collapse_min_run,
            self.config.collapse_keep,
        );
        Some(selection)
    }

    /// Update the region; false (and idle) if the gesture is gone or was
    /// started on another layer
    fn track(&mut self, layer: &TextLayer, x: f32, y: f32) -> bool {
        match &mut self.state {
            TrackerState::Selecting { region, generation } => {
                if *generation != layer.generation() {
                    debug!("Text layer was rebuilt mid-gesture, cancelling selection");
                    self.state = TrackerState::Idle;
                    return false;
                }
                region.current_x = x;
                region.current_y = y;
                true
            }
            TrackerState::Idle => false,
        }
    }
}

/// Indices of selectable fragments whose overlap with `rect` covers at least
/// `threshold` of their own area
#[must_use]
pub fn fragments_in_rect(layer: &TextLayer, rect: &Rect, threshold: f32) -> Vec<usize> {
    layer
        .fragments()
        .iter()
        .enumerate()
        .filter(|(_, frag)| {
            let area = frag.area();
            !frag.is_whitespace()
                && area > 0.0
                && frag.rect().intersection_area(rect) >= threshold * area
        })
        .map(|(i, _)| i)
        .collect()
}

/// Order fragments top-to-bottom by line, then left-to-right in each line.
///
/// Fragments belong to the same line when their tops are within half a
/// fragment height of the line's first fragment.
fn document_order(fragments: &[TextFragment], indices: Vec<usize>) -> Vec<&TextFragment> {
    let mut selected: Vec<&TextFragment> = indices.into_iter().map(|i| &fragments[i]).collect();
    selected.sort_by(|a, b| a.top.total_cmp(&b.top).then(a.left.total_cmp(&b.left)));

    let mut lines: Vec<Vec<&TextFragment>> = Vec::new();
    for frag in selected {
        match lines.last_mut() {
            Some(line) if same_line(line[0], frag) => line.push(frag),
            _ => lines.push(vec![frag]),
        }
    }

    lines
        .into_iter()
        .flat_map(|mut line| {
            line.sort_by(|a, b| a.left.total_cmp(&b.left));
            line
        })
        .collect()
}

fn make_selection(fragments: &[&TextFragment], granularity: Granularity) -> Option<Selection> {
    let text = compose_text(fragments, granularity);
    if text.is_empty() {
        return None;
    }

    let kept: Vec<TextFragment> = fragments
        .iter()
        .filter(|f| !f.is_whitespace())
        .map(|f| (*f).clone())
        .collect();
    let rects: Vec<Rect> = kept.iter().map(TextFragment::rect).collect();
    let bounds = bounding_rect(&rects)?;

    Some(Selection {
        text,
        fragments: kept,
        bounding_rect: bounds,
    })
}

/// Join fragments into selection text.
///
/// Words are separated by one space. Glyphs are joined directly when they
/// touch on the same line, and by one space across gaps or line breaks.
/// Whitespace fragments only ever act as separators.
#[must_use]
pub fn compose_text(fragments: &[&TextFragment], granularity: Granularity) -> String {
    let mut out = String::new();
    let mut prev: Option<&TextFragment> = None;

    for frag in fragments.iter().copied().filter(|f| !f.is_whitespace()) {
        if let Some(p) = prev {
            let joined = granularity == Granularity::Glyph && glyphs_touch(p, frag);
            if !joined {
                out.push(' ');
            }
        }
        out.push_str(&frag.text);
        prev = Some(frag);
    }

    out
}

fn same_line(a: &TextFragment, b: &TextFragment) -> bool {
    (a.top - b.top).abs() <= a.height.max(b.height) / 2.0
}

fn glyphs_touch(a: &TextFragment, b: &TextFragment) -> bool {
    let gap = b.left - (a.left + a.width);
    same_line(a, b) && gap.abs() <= a.width.max(b.width) * 0.5
}

/// Shorten every run of one character repeated `min_run` or more times to
/// `keep` characters
#[must_use]
pub fn collapse_repeats(text: &str, min_run: usize, keep: usize) -> String {
    if min_run == 0 {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        let mut count = 1;
        while chars.peek() == Some(&c) {
            chars.next();
            count += 1;
        }
        let emit = if count >= min_run { keep.min(count) } else { count };
        out.extend(std::iter::repeat_n(c, emit));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::text_layer::TextLayerBuilder;
    use crate::pdf::types::{TextRun, Viewport};

    fn run(text: &str, x: f32, y: f32) -> TextRun {
        TextRun {
            text: text.to_string(),
            transform: [10.0, 0.0, 0.0, 10.0, x, y],
            font_height: 10.0,
            font_ascent: 10.0,
            run_width: text.chars().count() as f32 * 10.0,
        }
    }

    fn layer(granularity: Granularity, runs: &[TextRun]) -> TextLayer {
        TextLayerBuilder::new(granularity).build(runs, &Viewport::new(0, 500.0, 500.0, 1.0))
    }

    fn drag(tracker: &mut SelectionTracker, layer: &TextLayer, r: Rect) -> Option<Selection> {
        tracker.pointer_down(layer, r.left, r.top);
        let _ = tracker.pointer_move(layer, (r.left + r.right) / 2.0, r.bottom);
        tracker.pointer_up(layer, r.right, r.bottom)
    }

    #[test]
    fn overlap_threshold_boundary() {
        // Single word "abcdefghij": left 0, top 0, 100 x 10.
        let l = layer(Granularity::Word, &[run("abcdefghij", 0.0, 10.0)]);
        let mut tracker = SelectionTracker::new(SelectionConfig::default());

        let below = drag(&mut tracker, &l, Rect::new(66.0, 0.0, 100.0, 10.0));
        assert_eq!(below, None);

        let above = drag(&mut tracker, &l, Rect::new(64.0, 0.0, 100.0, 10.0));
        assert_eq!(above.map(|s| s.text), Some("abcdefghij".to_string()));
    }

    #[test]
    fn threshold_is_configurable() {
        let l = layer(Granularity::Word, &[run("abcdefghij", 0.0, 10.0)]);
        let mut tracker = SelectionTracker::new(SelectionConfig {
            overlap_threshold: 0.9,
            ..SelectionConfig::default()
        });
        assert!(drag(&mut tracker, &l, Rect::new(20.0, 0.0, 100.0, 10.0)).is_none());
    }

    #[test]
    fn selection_text_follows_document_order() {
        let l = layer(
            Granularity::Word,
            &[run("second", 0.0, 40.0), run("world", 70.0, 20.0), run("hello", 0.0, 20.0)],
        );
        let mut tracker = SelectionTracker::new(SelectionConfig::default());

        // Drag bottom-right to top-left.
        tracker.pointer_down(&l, 200.0, 60.0);
        let sel = tracker.pointer_up(&l, 0.0, 0.0).unwrap();
        assert_eq!(sel.text, "hello world second");
        assert_eq!(sel.bounding_rect, Rect::new(0.0, 10.0, 120.0, 40.0));
    }

    #[test]
    fn empty_drag_yields_nothing() {
        let l = layer(Granularity::Word, &[run("hello", 0.0, 20.0)]);
        let mut tracker = SelectionTracker::new(SelectionConfig::default());
        assert!(drag(&mut tracker, &l, Rect::new(300.0, 300.0, 400.0, 400.0)).is_none());
        assert!(!tracker.is_selecting());
    }

    #[test]
    fn whitespace_fragments_are_never_hit() {
        let l = layer(Granularity::Word, &[run("a   b", 0.0, 20.0)]);
        let mut tracker = SelectionTracker::new(SelectionConfig::default());
        // Covers only the whitespace run between the words.
        assert!(drag(&mut tracker, &l, Rect::new(11.0, 10.0, 39.0, 20.0)).is_none());
    }

    #[test]
    fn pointer_down_supersedes_previous_gesture() {
        let l = layer(Granularity::Word, &[run("hello", 0.0, 20.0)]);
        let mut tracker = SelectionTracker::new(SelectionConfig::default());

        tracker.pointer_down(&l, 0.0, 0.0);
        assert!(!tracker.pointer_move(&l, 60.0, 30.0).is_empty());

        tracker.pointer_down(&l, 300.0, 300.0);
        assert_eq!(tracker.region(), Some(SelectionRegion::at(300.0, 300.0)));
        assert!(tracker.highlighted(&l).is_empty());
    }

    #[test]
    fn rebuilt_layer_cancels_gesture() {
        let mut builder = TextLayerBuilder::new(Granularity::Word);
        let vp = Viewport::new(0, 500.0, 500.0, 1.0);
        let old = builder.build(&[run("hello", 0.0, 20.0)], &vp);
        let new = builder.build(&[run("hello", 0.0, 20.0)], &vp);

        let mut tracker = SelectionTracker::new(SelectionConfig::default());
        tracker.pointer_down(&old, 0.0, 0.0);
        assert!(tracker.highlighted(&new).is_empty());
        assert!(tracker.pointer_up(&new, 100.0, 100.0).is_none());
        assert!(!tracker.is_selecting());
    }

    #[test]
    fn pointer_up_without_down_is_ignored() {
        let l = layer(Granularity::Word, &[run("hello", 0.0, 20.0)]);
        let mut tracker = SelectionTracker::new(SelectionConfig::default());
        assert!(tracker.pointer_up(&l, 100.0, 100.0).is_none());
    }

    #[test]
    fn glyph_selection_rejoins_words() {
        let l = layer(Granularity::Glyph, &[run("ab cd", 0.0, 20.0)]);
        let mut tracker = SelectionTracker::new(SelectionConfig::default());
        let sel = drag(&mut tracker, &l, Rect::new(0.0, 0.0, 60.0, 30.0)).unwrap();
        assert_eq!(sel.text, "ab cd");
        assert_eq!(sel.fragments.len(), 4);
    }

    #[test]
    fn touching_glyphs_join_only_within_a_line() {
        let l = layer(
            Granularity::Glyph,
            &[run("ab", 0.0, 20.0), run("cd", 0.0, 40.0)],
        );
        let tracker = SelectionTracker::new(SelectionConfig::default());
        let sel = tracker
            .select_native(&l, NativeRange { anchor: 0, focus: 3 })
            .unwrap();
        assert_eq!(sel.text, "ab cd");

        // Touching words still get a separator.
        let words = layer(
            Granularity::Word,
            &[run("ab", 0.0, 20.0), run("cd", 20.0, 20.0)],
        );
        let sel = tracker
            .select_native(&words, NativeRange { anchor: 0, focus: 1 })
            .unwrap();
        assert_eq!(sel.text, "ab cd");
    }

    #[test]
    fn native_range_joins_in_source_order_and_collapses_repeats() {
        let l = layer(
            Granularity::Word,
            &[run("Revenue growww", 0.0, 20.0), run("up", 0.0, 40.0)],
        );
        let tracker = SelectionTracker::new(SelectionConfig::default());

        let sel = tracker
            .select_native(&l, NativeRange { anchor: 3, focus: 0 })
            .unwrap();
        assert_eq!(sel.text, "Revenue groww up");
        assert_eq!(sel.fragments.len(), 3);
    }

    #[test]
    fn native_range_over_whitespace_only_is_empty() {
        let l = layer(Granularity::Word, &[run("a   b", 0.0, 20.0)]);
        let tracker = SelectionTracker::new(SelectionConfig::default());
        assert!(tracker.select_native(&l, NativeRange { anchor: 1, focus: 1 }).is_none());
    }

    #[test]
    fn native_range_on_empty_layer_is_none() {
        let l = layer(Granularity::Word, &[]);
        let tracker = SelectionTracker::new(SelectionConfig::default());
        assert!(tracker.select_native(&l, NativeRange { anchor: 0, focus: 0 }).is_none());
    }

    #[test]
    fn collapse_repeats_shortens_long_runs_only() {
        assert_eq!(collapse_repeats("aaabbcdddd", 3, 2), "aabbcdd");
        assert_eq!(collapse_repeats("book", 3, 2), "book");
        assert_eq!(collapse_repeats("", 3, 2), "");
        assert_eq!(collapse_repeats("xxx", 0, 2), "xxx");
    }
}
