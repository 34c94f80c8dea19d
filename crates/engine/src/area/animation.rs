/// Handle into the area's tile-type table. The renderer collaborator maps
/// it to an atlas region; the runtime only threads it through.
pub type ImageRef = u32;

/// A frame-cycling image sequence with a uniform per-frame duration.
///
/// Frames are computed lazily from "now": there is no per-frame tick call.
/// The per-frame duration is `1000 / hertz` truncated to whole
/// milliseconds; the truncation drift at high frequencies is part of the
/// observable contract and is kept as-is.
#[derive(Debug, Clone, PartialEq)]
pub struct Animation {
    frames: Vec<ImageRef>,
    frame_len_ms: u64,
    cycle_len_ms: u64,
    offset_ms: u64,
    frame_shown: usize,
}

impl Animation {
    /// A single-frame animation. Never advances and never needs redraw.
    pub fn still(image: ImageRef) -> Self {
        Self {
            frames: vec![image],
            frame_len_ms: 0,
            cycle_len_ms: 0,
            offset_ms: 0,
            frame_shown: 0,
        }
    }

    /// A cycling animation advancing at `hertz` frames per second.
    ///
    /// Falls back to a still frame when fewer than two frames are given.
    pub fn cycling(frames: Vec<ImageRef>, hertz: f32) -> Self {
        debug_assert!(!frames.is_empty(), "animation needs at least one frame");
        debug_assert!(hertz > 0.0, "animation frequency must be positive");
        if frames.len() < 2 {
            return Self::still(frames.first().copied().unwrap_or(0));
        }
        let frame_len_ms = (1000.0 / hertz) as u64;
        Self {
            cycle_len_ms: frame_len_ms * frames.len() as u64,
            frames,
            frame_len_ms,
            offset_ms: 0,
            frame_shown: 0,
        }
    }

    pub fn is_cycling(&self) -> bool {
        self.frames.len() > 1
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn frame_len_ms(&self) -> u64 {
        self.frame_len_ms
    }

    /// Re-origins the cycle at `now_ms`.
    pub fn restart(&mut self, now_ms: u64) {
        self.offset_ms = now_ms;
        self.frame_shown = 0;
    }

    fn frame_index_at(&self, now_ms: u64) -> usize {
        if !self.is_cycling() {
            return 0;
        }
        let elapsed = now_ms.saturating_sub(self.offset_ms);
        ((elapsed / self.frame_len_ms) % self.frames.len() as u64) as usize
    }

    /// The frame to draw at `now_ms`; records it as the frame shown.
    pub fn frame(&mut self, now_ms: u64) -> ImageRef {
        let index = self.frame_index_at(now_ms);
        self.frame_shown = index;
        self.frames[index]
    }

    /// True iff drawing now would yield a different frame than last time.
    pub fn needs_redraw(&self, now_ms: u64) -> bool {
        self.is_cycling() && self.frame_index_at(now_ms) != self.frame_shown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn still_animation_never_needs_redraw() {
        let mut anim = Animation::still(7);
        assert_eq!(anim.frame(0), 7);
        assert!(!anim.needs_redraw(10_000));
        assert_eq!(anim.frame(10_000), 7);
    }

    #[test]
    fn cycling_animation_walks_frames_by_elapsed_time() {
        // 4 Hz -> 250 ms per frame.
        let mut anim = Animation::cycling(vec![3, 4, 5], 4.0);
        anim.restart(1_000);
        assert_eq!(anim.frame(1_000), 3);
        assert_eq!(anim.frame(1_249), 3);
        assert_eq!(anim.frame(1_250), 4);
        assert_eq!(anim.frame(1_500), 5);
        // Wraps modulo frame count.
        assert_eq!(anim.frame(1_750), 3);
    }

    #[test]
    fn needs_redraw_tracks_the_last_shown_frame() {
        let mut anim = Animation::cycling(vec![1, 2], 10.0);
        anim.restart(0);
        assert_eq!(anim.frame(0), 1);
        assert!(!anim.needs_redraw(50));
        assert!(anim.needs_redraw(100));
        assert_eq!(anim.frame(100), 2);
        assert!(!anim.needs_redraw(150));
    }

    #[test]
    fn frame_length_truncates_to_whole_milliseconds() {
        // 60 Hz is 16.66 ms; the stored length truncates to 16 ms and the
        // resulting drift is intentional.
        let anim = Animation::cycling(vec![0, 1], 60.0);
        assert_eq!(anim.frame_len_ms(), 16);
        let anim = Animation::cycling(vec![0, 1], 3.0);
        assert_eq!(anim.frame_len_ms(), 333);
    }

    #[test]
    fn restart_reorigins_the_cycle() {
        let mut anim = Animation::cycling(vec![8, 9], 2.0);
        anim.restart(0);
        assert_eq!(anim.frame(600), 9);
        anim.restart(600);
        assert_eq!(anim.frame(600), 8);
        // Instants before the new origin clamp to the first frame.
        assert_eq!(anim.frame(100), 8);
    }
}
