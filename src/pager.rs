use crate::error::PagerError;
use crate::stream::RingStream;

/// Window sizes (in samples) that steer page selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagerTuning {
    pub num_samples_to_render: usize,
    /// A new page must start at least this far after the previous one.
    pub min_samples_to_advance: usize,
    /// Pages never start further back than this from the newest full page.
    pub max_rendering_latency_samples: usize,
    /// Below this many candidate start positions the pager waits for more data.
    pub min_search_space_samples: usize,
}

impl Default for PagerTuning {
    fn default() -> Self {
        Self {
            num_samples_to_render: 400,
            min_samples_to_advance: 400,
            max_rendering_latency_samples: 4_000,
            min_search_space_samples: 2_000,
        }
    }
}

impl PagerTuning {
    pub fn validate(&self) -> Result<(), PagerError> {
        if self.num_samples_to_render == 0 {
            return Err(PagerError::InvalidTuning(
                "num_samples_to_render must be positive".to_string(),
            ));
        }
        if self.max_rendering_latency_samples <= self.min_search_space_samples {
            return Err(PagerError::InvalidTuning(format!(
                "max_rendering_latency_samples ({}) must exceed min_search_space_samples ({})",
                self.max_rendering_latency_samples, self.min_search_space_samples
            )));
        }
        Ok(())
    }
}

/// Picks successive display pages out of a [`RingStream`] so that each page
/// starts on a rising zero crossing and lines up with the page before it.
pub struct OscilloscopePager {
    tuning: PagerTuning,
    last_rendered_start_index: i64,
    last_rendered_data: Vec<i16>,
}

impl OscilloscopePager {
    pub fn new(tuning: PagerTuning) -> Result<Self, PagerError> {
        tuning.validate()?;
        Ok(Self {
            tuning,
            // Lets the first page start at index 0.
            last_rendered_start_index: -(tuning.min_samples_to_advance as i64),
            last_rendered_data: vec![0; tuning.num_samples_to_render],
        })
    }

    pub fn tuning(&self) -> PagerTuning {
        self.tuning
    }

    pub fn last_rendered_start_index(&self) -> i64 {
        self.last_rendered_start_index
    }

    pub fn last_rendered_data(&self) -> &[i16] {
        &self.last_rendered_data
    }

    /// Advances to the next page if enough fresh data is buffered.
    ///
    /// Returns `true` when the page changed.
    pub fn select_page(&mut self, stream: &RingStream) -> bool {
        let tuning = self.tuning;
        let page_len = tuning.num_samples_to_render as i64;
        let previous_start = self.last_rendered_start_index;

        let selected = stream.with_state(|state| {
            let right = state.right_index();
            let max_index = right - page_len;
            let min_index = (max_index - tuning.max_rendering_latency_samples as i64)
                .max(previous_start + tuning.min_samples_to_advance as i64)
                .max(state.left_index());

            let search_space = max_index - min_index;
            if search_space < tuning.min_search_space_samples as i64 {
                log::trace!(
                    "scope page held: search space {} < {}",
                    search_space,
                    tuning.min_search_space_samples
                );
                return None;
            }
            // One sample of lead-in lets a page start on a crossing at min_index.
            let from = if min_index > state.left_index() {
                min_index - 1
            } else {
                min_index
            };
            Some((from, state.slice(from, right)))
        });

        let Some((from, candidate)) = selected else {
            return false;
        };
        let offset = find_best_offset(
            &candidate,
            &self.last_rendered_data,
            tuning.num_samples_to_render,
        );
        self.last_rendered_start_index = from + offset as i64;
        self.last_rendered_data.clear();
        self.last_rendered_data
            .extend_from_slice(&candidate[offset..offset + tuning.num_samples_to_render]);
        true
    }
}

/// Start offset within `candidate` for the next `n`-sample page.
///
/// Only rising zero crossings (`candidate[o - 1] <= 0 < candidate[o]`) are
/// considered; the one whose window is closest to `previous` by sum of squared
/// differences wins, earliest first on ties. Without any crossing the most
/// recent window, `candidate.len() - n`, is returned.
pub fn find_best_offset(candidate: &[i16], previous: &[i16], n: usize) -> usize {
    let Some(latest) = candidate.len().checked_sub(n) else {
        return 0;
    };

    let mut best: Option<(usize, i64)> = None;
    for offset in 1..=latest.min(candidate.len().saturating_sub(1)) {
        if !(candidate[offset - 1] <= 0 && candidate[offset] > 0) {
            continue;
        }
        let score = similarity(&candidate[offset..offset + n], previous);
        if best.is_none_or(|(_, best_score)| score > best_score) {
            best = Some((offset, score));
        }
    }
    best.map_or(latest, |(offset, _)| offset)
}

/// Negative sum of squared differences; higher is more alike.
fn similarity(window: &[i16], previous: &[i16]) -> i64 {
    -window
        .iter()
        .zip(previous)
        .map(|(&a, &b)| {
            let diff = a as i64 - b as i64;
            diff * diff
        })
        .sum::<i64>()
}

#[cfg(test)]
mod tests {
    use std::f64::consts::TAU;

    use super::*;

    fn sine(len: usize, period: usize) -> Vec<i16> {
        (0..len)
            .map(|i| ((i % period) as f64 / period as f64 * TAU).sin())
            .map(|x| (x * 10_000.0).round() as i16)
            .collect()
    }

    fn small_tuning() -> PagerTuning {
        PagerTuning {
            num_samples_to_render: 200,
            min_samples_to_advance: 200,
            max_rendering_latency_samples: 1_000,
            min_search_space_samples: 300,
        }
    }

    #[test]
    fn tuning_requires_latency_above_search_space() {
        let tuning = PagerTuning {
            max_rendering_latency_samples: 2_000,
            ..PagerTuning::default()
        };
        assert!(matches!(
            OscilloscopePager::new(tuning),
            Err(PagerError::InvalidTuning(_))
        ));
        assert!(OscilloscopePager::new(PagerTuning::default()).is_ok());
    }

    #[test]
    fn no_crossing_falls_back_to_latest_window() {
        let candidate = vec![100i16; 50];
        assert_eq!(find_best_offset(&candidate, &[0; 10], 10), 40);

        let falling: Vec<i16> = (0..30).map(|i| 100 - i * 10).collect();
        assert_eq!(find_best_offset(&falling, &[0; 5], 5), 25);
    }

    #[test]
    fn short_candidate_returns_zero() {
        assert_eq!(find_best_offset(&[1, 2], &[0; 4], 4), 0);
    }

    #[test]
    fn zero_length_page_stays_in_bounds() {
        assert_eq!(find_best_offset(&[-1], &[], 0), 1);
        assert_eq!(find_best_offset(&[-1, 1], &[], 0), 1);
        assert_eq!(find_best_offset(&[], &[], 0), 0);
    }

    #[test]
    fn best_matching_crossing_wins() {
        let previous = [5i16, 5, 5, 5];
        let candidate = [-1i16, 1, 1, 1, 1, -1, 5, 5, 5, 5];
        assert_eq!(find_best_offset(&candidate, &previous, 4), 6);
    }

    #[test]
    fn ties_go_to_earliest_crossing() {
        let candidate = [0i16, 3, -3, 0, 3, -3, 0, 3, -3];
        assert_eq!(find_best_offset(&candidate, &[0, 0], 2), 1);
    }

    #[test]
    fn page_held_without_enough_search_space() {
        let stream = RingStream::new(10_000).unwrap();
        stream.extend(&sine(2_000, 100));
        let mut pager = OscilloscopePager::new(PagerTuning::default()).unwrap();
        // max_index = 1600, min_index = max(-2400, 0) = 0: 1600 < 2000
        let before = pager.last_rendered_data().to_vec();
        assert!(!pager.select_page(&stream));
        assert_eq!(pager.last_rendered_data(), before.as_slice());
        assert_eq!(pager.last_rendered_start_index(), -400);
    }

    #[test]
    fn pages_start_on_aligned_crossings() {
        let stream = RingStream::new(10_000).unwrap();
        let wave = sine(4_000, 100);
        stream.extend(&wave[..2_000]);

        let mut pager = OscilloscopePager::new(small_tuning()).unwrap();
        assert!(pager.select_page(&stream));
        let first = pager.last_rendered_start_index();
        assert_eq!(first, 801);
        assert_eq!(pager.last_rendered_data(), &wave[801..1_001]);

        // The crossing sits exactly one page width later, at min_index.
        stream.extend(&wave[2_000..2_100]);
        assert!(pager.select_page(&stream));
        let second = pager.last_rendered_start_index();
        assert_eq!(second, 1_001);
        assert_eq!(pager.last_rendered_data(), &wave[1_001..1_201]);

        assert!(pager.select_page(&stream));
        assert_eq!(pager.last_rendered_start_index(), 1_201);
        assert!(pager.select_page(&stream));
        assert_eq!(pager.last_rendered_start_index(), 1_401);

        // min_index = 1601, max_index = 1900: search space 299 < 300
        assert!(!pager.select_page(&stream));
        assert_eq!(pager.last_rendered_start_index(), 1_401);
    }

    #[test]
    fn stream_without_crossings_renders_newest_page() {
        let stream = RingStream::new(10_000).unwrap();
        stream.extend(&vec![250i16; 3_000]);
        let mut pager = OscilloscopePager::new(small_tuning()).unwrap();
        assert!(pager.select_page(&stream));
        assert_eq!(pager.last_rendered_start_index(), 2_800);
        assert_eq!(pager.last_rendered_data(), vec![250i16; 200].as_slice());
    }

    #[test]
    fn small_stream_never_pages_before_left_index() {
        let stream = RingStream::new(600).unwrap();
        stream.extend(&sine(5_000, 100));
        let mut pager = OscilloscopePager::new(small_tuning()).unwrap();
        // left = 4400, max = 4800: only 400 candidate starts remain
        assert!(pager.select_page(&stream));
        assert!(pager.last_rendered_start_index() >= stream.left_index());
        assert_eq!(pager.last_rendered_start_index() % 100, 1);
    }
}
