//! View state management
//!
//! Page and zoom changes are expressed as commands; the effects they return
//! tell the caller what to discard and what to render next.

/// Current view state for a loaded document
#[derive(Clone, Debug)]
pub struct ViewState {
    /// Current page (0-indexed)
    pub current_page: usize,

    /// Total page count
    pub page_count: usize,

    /// Current scale factor
    pub scale: f32,

    /// Allowed scale range
    pub min_scale: f32,
    pub max_scale: f32,
}

impl ViewState {
    #[must_use]
    pub fn new(page_count: usize, scale: f32, min_scale: f32, max_scale: f32) -> Self {
        let mut state = Self {
            current_page: 0,
            page_count,
            scale: 1.0,
            min_scale,
            max_scale: max_scale.max(min_scale),
        };
        state.scale = state.clamp_scale(scale);
        state
    }

    /// Clamp a requested scale into the allowed range, handling NaN/Inf
    #[must_use]
    pub fn clamp_scale(&self, scale: f32) -> f32 {
        if scale.is_finite() {
            scale.clamp(self.min_scale, self.max_scale)
        } else {
            1.0_f32.clamp(self.min_scale, self.max_scale)
        }
    }

    /// Apply a command and return resulting effects
    #[must_use]
    pub fn apply(&mut self, cmd: Command) -> Vec<Effect> {
        match cmd {
            Command::GoToPage(page) => {
                let clamped = page.min(self.page_count.saturating_sub(1));
                if self.current_page != clamped {
                    self.current_page = clamped;
                    vec![
                        Effect::CancelSelection,
                        Effect::DiscardTextLayer,
                        Effect::RenderCurrentPage,
                        Effect::UpdatePrefetch,
                    ]
                } else {
                    vec![]
                }
            }

            Command::SetScale(scale) => {
                let clamped = self.clamp_scale(scale);
                if (self.scale - clamped).abs() > f32::EPSILON {
                    self.scale = clamped;
                    vec![
                        Effect::CancelSelection,
                        Effect::DiscardTextLayer,
                        Effect::RenderCurrentPage,
                        Effect::UpdatePrefetch,
                    ]
                } else {
                    vec![]
                }
            }

            Command::Redisplay => vec![
                Effect::CancelSelection,
                Effect::DiscardTextLayer,
                Effect::RenderCurrentPage,
            ],
        }
    }
}

/// Commands that modify view state
#[derive(Clone, Debug)]
pub enum Command {
    /// Go to a specific page
    GoToPage(usize),
    /// Set the scale factor
    SetScale(f32),
    /// Render the current page again without changing state
    Redisplay,
}

/// Effects produced by state changes
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Effect {
    /// Drop any in-flight selection gesture
    CancelSelection,
    /// Drop the current text layer
    DiscardTextLayer,
    /// Render the current page and rebuild its text layer
    RenderCurrentPage,
    /// Warm the cache around the current page
    UpdatePrefetch,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_state() -> ViewState {
        ViewState::new(10, 1.0, 0.5, 2.0)
    }

    #[test]
    fn go_to_page_rebuilds_and_prefetches() {
        let mut state = test_state();

        let effects = state.apply(Command::GoToPage(5));
        assert_eq!(state.current_page, 5);
        assert_eq!(
            effects,
            vec![
                Effect::CancelSelection,
                Effect::DiscardTextLayer,
                Effect::RenderCurrentPage,
                Effect::UpdatePrefetch
            ]
        );
    }

    #[test]
    fn go_to_page_clamps_to_max() {
        let mut state = test_state();

        let _ = state.apply(Command::GoToPage(999));
        assert_eq!(state.current_page, 9);
    }

    #[test]
    fn same_page_is_a_no_op() {
        let mut state = test_state();
        assert!(state.apply(Command::GoToPage(0)).is_empty());
    }

    #[test]
    fn scale_is_clamped_to_range() {
        let mut state = test_state();

        let effects = state.apply(Command::SetScale(5.0));
        assert_eq!(state.scale, 2.0);
        assert!(effects.contains(&Effect::DiscardTextLayer));

        let _ = state.apply(Command::SetScale(0.1));
        assert_eq!(state.scale, 0.5);

        let _ = state.apply(Command::SetScale(f32::NAN));
        assert_eq!(state.scale, 1.0);
    }

    #[test]
    fn unchanged_scale_returns_empty() {
        let mut state = test_state();
        assert!(state.apply(Command::SetScale(1.0)).is_empty());
    }

    #[test]
    fn redisplay_rebuilds_without_prefetch() {
        let mut state = test_state();
        let effects = state.apply(Command::Redisplay);
        assert_eq!(state.current_page, 0);
        assert_eq!(
            effects,
            vec![
                Effect::CancelSelection,
                Effect::DiscardTextLayer,
                Effect::RenderCurrentPage
            ]
        );
    }

    #[test]
    fn initial_scale_is_clamped() {
        let state = ViewState::new(1, 9.0, 0.5, 2.0);
        assert_eq!(state.scale, 2.0);
    }
}
