use crate::glyph::{render_text, ClockFont, GlyphBitmap};
use chrono::NaiveTime;
use std::sync::Arc;

/// Width of each `:` bitmap, independent of font metrics.
pub const COLON_WIDTH: u32 = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeParts {
    pub hours: String,
    pub minutes: String,
    pub seconds: String,
}

impl TimeParts {
    pub fn from_time(time: NaiveTime) -> Self {
        Self {
            hours: time.format("%H").to_string(),
            minutes: time.format("%M").to_string(),
            seconds: time.format("%S").to_string(),
        }
    }

    pub fn joined(&self) -> String {
        format!("{}:{}:{}", self.hours, self.minutes, self.seconds)
    }
}

/// Which segments a tick re-rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickChanges {
    pub hours: bool,
    pub minutes: bool,
    pub seconds: bool,
}

impl TickChanges {
    pub fn any(self) -> bool {
        self.hours || self.minutes || self.seconds
    }
}

/// One rendered piece of the clock, drawn centered on `center`.
#[derive(Debug, Clone)]
pub struct Segment {
    text: String,
    bitmap: Arc<GlyphBitmap>,
    center: (f32, f32),
    slot_width: u32,
    revision: u64,
}

impl Segment {
    fn new(text: String, bitmap: Arc<GlyphBitmap>, center: (f32, f32), slot_width: u32) -> Self {
        Self {
            text,
            bitmap,
            center,
            slot_width,
            revision: 0,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn bitmap(&self) -> &Arc<GlyphBitmap> {
        &self.bitmap
    }

    pub fn center(&self) -> (f32, f32) {
        self.center
    }

    /// Width reserved for this segment when the clock was built.
    pub fn slot_width(&self) -> u32 {
        self.slot_width
    }

    /// Bumped every time the bitmap is replaced.
    pub fn revision(&self) -> u64 {
        self.revision
    }
}

#[derive(Debug, Clone)]
pub struct SegmentedClock {
    font: ClockFont,
    color: [u8; 3],
    pub hours: Segment,
    pub colon1: Segment,
    pub minutes: Segment,
    pub colon2: Segment,
    pub seconds: Segment,
}

impl SegmentedClock {
    /// Drawing order, left to right.
    pub fn segments(&self) -> [(&'static str, &Segment); 5] {
        [
            ("hours", &self.hours),
            ("colon1", &self.colon1),
            ("minutes", &self.minutes),
            ("colon2", &self.colon2),
            ("seconds", &self.seconds),
        ]
    }

    pub fn total_width(&self) -> u32 {
        self.segments().iter().map(|(_, s)| s.slot_width).sum()
    }

    // Only the bitmap is swapped; slot positions stay where `build` put
    // them even when the new text renders wider or narrower.
    fn refresh(segment: &mut Segment, text: &str, font: &ClockFont, color: [u8; 3]) -> bool {
        if segment.text == text {
            return false;
        }
        segment.bitmap = Arc::new(render_text(text, Some(font), color, None));
        segment.text = text.to_string();
        segment.revision += 1;
        true
    }
}

/// Single `HH:MM:SS` string drawn with the UI font when no clock font loaded.
#[derive(Debug, Clone)]
pub struct FallbackClock {
    pub text: String,
    pub seconds: String,
    pub center: (f32, f32),
    pub font_size: u32,
    pub color: [u8; 3],
    pub revision: u64,
}

#[derive(Debug, Clone)]
pub enum ClockView {
    Segmented(SegmentedClock),
    Fallback(FallbackClock),
}

impl ClockView {
    /// Lay out `[H][:][M][:][S]` centered on a canvas of `canvas` pixels.
    pub fn build(
        now: NaiveTime,
        font: Option<&ClockFont>,
        color: [u8; 3],
        font_size: u32,
        canvas: (u32, u32),
    ) -> Self {
        let parts = TimeParts::from_time(now);
        let center_x = (canvas.0 / 2) as i64;
        let center_y = (canvas.1 / 2) as f32;

        let Some(font) = font else {
            tracing::debug!("building fallback clock");
            return ClockView::Fallback(FallbackClock {
                text: parts.joined(),
                seconds: parts.seconds,
                center: (center_x as f32, center_y),
                font_size,
                color,
                revision: 0,
            });
        };

        let hours = Arc::new(render_text(&parts.hours, Some(font), color, None));
        let minutes = Arc::new(render_text(&parts.minutes, Some(font), color, None));
        let seconds = Arc::new(render_text(&parts.seconds, Some(font), color, None));
        let colon = Arc::new(render_text(":", Some(font), color, Some(COLON_WIDTH)));

        let widths = [
            hours.width(),
            colon.width(),
            minutes.width(),
            colon.width(),
            seconds.width(),
        ];
        let total: i64 = widths.iter().map(|&w| w as i64).sum();
        let mut x = center_x - total / 2;
        let mut place = |width: u32| {
            let center = ((x + (width / 2) as i64) as f32, center_y);
            x += width as i64;
            center
        };
        let hours_center = place(widths[0]);
        let colon1_center = place(widths[1]);
        let minutes_center = place(widths[2]);
        let colon2_center = place(widths[3]);
        let seconds_center = place(widths[4]);

        ClockView::Segmented(SegmentedClock {
            font: font.clone(),
            color,
            hours: Segment::new(parts.hours, hours, hours_center, widths[0]),
            colon1: Segment::new(":".into(), Arc::clone(&colon), colon1_center, widths[1]),
            minutes: Segment::new(parts.minutes, minutes, minutes_center, widths[2]),
            colon2: Segment::new(":".into(), colon, colon2_center, widths[3]),
            seconds: Segment::new(parts.seconds, seconds, seconds_center, widths[4]),
        })
    }

    /// Re-render the segments whose text differs from the last tick.
    pub fn tick(&mut self, now: NaiveTime) -> TickChanges {
        let parts = TimeParts::from_time(now);
        match self {
            ClockView::Segmented(clock) => {
                let color = clock.color;
                TickChanges {
                    hours: SegmentedClock::refresh(&mut clock.hours, &parts.hours, &clock.font, color),
                    minutes: SegmentedClock::refresh(
                        &mut clock.minutes,
                        &parts.minutes,
                        &clock.font,
                        color,
                    ),
                    seconds: SegmentedClock::refresh(
                        &mut clock.seconds,
                        &parts.seconds,
                        &clock.font,
                        color,
                    ),
                }
            }
            ClockView::Fallback(clock) => {
                // hours and minutes only ever change together with seconds
                if clock.seconds == parts.seconds {
                    return TickChanges::default();
                }
                clock.text = parts.joined();
                clock.seconds = parts.seconds;
                clock.revision += 1;
                TickChanges {
                    hours: true,
                    minutes: true,
                    seconds: true,
                }
            }
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, ClockView::Fallback(_))
    }
}

#[cfg(test)]
mod tests {
    use super::{ClockView, TimeParts, COLON_WIDTH};
    use crate::glyph::ClockFont;
    use chrono::NaiveTime;
    use std::sync::Arc;

    fn font() -> ClockFont {
        let definitions = eframe::egui::FontDefinitions::default();
        let name = definitions.families[&eframe::egui::FontFamily::Proportional][0].clone();
        let data = &definitions.font_data[&name];
        let font = ab_glyph::FontVec::try_from_vec_and_index(data.font.to_vec(), data.index)
            .expect("bundled font");
        ClockFont::from_font(ab_glyph::FontArc::from(font), 46)
    }

    fn at(h: u32, m: u32, s: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, s).expect("valid time")
    }

    #[test]
    fn time_parts_are_zero_padded() {
        let parts = TimeParts::from_time(at(7, 5, 9));
        assert_eq!(parts.joined(), "07:05:09");
    }

    #[test]
    fn build_centers_block_on_canvas() {
        let ClockView::Segmented(clock) =
            ClockView::build(at(12, 34, 56), Some(&font()), [255, 255, 255], 46, (480, 270))
        else {
            panic!("expected segmented clock");
        };
        assert_eq!(clock.colon1.slot_width(), COLON_WIDTH);
        assert_eq!(clock.colon2.slot_width(), COLON_WIDTH);
        let segments = clock.segments();
        for pair in segments.windows(2) {
            assert!(pair[0].1.center().0 < pair[1].1.center().0);
        }
        for (_, segment) in segments {
            assert_eq!(segment.center().1, 135.0);
        }
        let left = clock.hours.center().0 - clock.hours.slot_width() as f32 / 2.0;
        let right = clock.seconds.center().0 + clock.seconds.slot_width() as f32 / 2.0;
        assert!(((left + right) / 2.0 - 240.0).abs() <= 2.0);
        assert!(Arc::ptr_eq(clock.colon1.bitmap(), clock.colon2.bitmap()));
    }

    #[test]
    fn seconds_only_change_keeps_other_bitmaps() {
        let mut view =
            ClockView::build(at(12, 59, 58), Some(&font()), [255, 255, 255], 46, (480, 270));
        let ClockView::Segmented(before) = view.clone() else {
            panic!("expected segmented clock");
        };

        let changes = view.tick(at(12, 59, 59));
        assert!(changes.seconds && !changes.minutes && !changes.hours);

        let ClockView::Segmented(after) = &view else {
            panic!("expected segmented clock");
        };
        assert!(Arc::ptr_eq(before.hours.bitmap(), after.hours.bitmap()));
        assert!(Arc::ptr_eq(before.minutes.bitmap(), after.minutes.bitmap()));
        assert!(!Arc::ptr_eq(before.seconds.bitmap(), after.seconds.bitmap()));
        assert_eq!(after.seconds.text(), "59");
        assert_eq!(after.seconds.revision(), 1);
    }

    #[test]
    fn rollover_regenerates_every_segment() {
        let mut view =
            ClockView::build(at(12, 59, 59), Some(&font()), [255, 255, 255], 46, (480, 270));
        let changes = view.tick(at(13, 0, 0));
        assert!(changes.hours && changes.minutes && changes.seconds);
    }

    #[test]
    fn unchanged_time_is_a_no_op() {
        let mut view =
            ClockView::build(at(8, 0, 0), Some(&font()), [255, 255, 255], 46, (480, 270));
        assert!(!view.tick(at(8, 0, 0)).any());
    }

    #[test]
    fn width_change_does_not_reflow_neighbors() {
        // Known boundary: a digit swap that renders wider or narrower keeps
        // the slot geometry from the initial build.
        let mut view =
            ClockView::build(at(9, 11, 11), Some(&font()), [255, 255, 255], 46, (480, 270));
        let ClockView::Segmented(before) = view.clone() else {
            panic!("expected segmented clock");
        };
        view.tick(at(10, 58, 58));
        let ClockView::Segmented(after) = &view else {
            panic!("expected segmented clock");
        };
        for ((_, b), (_, a)) in before.segments().iter().zip(after.segments().iter()) {
            assert_eq!(b.center(), a.center());
            assert_eq!(b.slot_width(), a.slot_width());
        }
    }

    #[test]
    fn fallback_redraws_only_when_seconds_change() {
        let mut view = ClockView::build(at(12, 59, 59), None, [255, 255, 255], 46, (360, 203));
        assert!(view.is_fallback());
        assert!(!view.tick(at(12, 59, 59)).any());
        assert!(view.tick(at(13, 0, 0)).any());
        let ClockView::Fallback(clock) = &view else {
            panic!("expected fallback clock");
        };
        assert_eq!(clock.text, "13:00:00");
        assert_eq!(clock.revision, 1);
        assert_eq!(clock.center, (180.0, 101.0));
    }
}
