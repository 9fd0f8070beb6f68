//! Deterministic frame timing and the render loop that walks it.
//!
//! `FrameSchedule` is pure arithmetic over a `RenderJob`; `FrameSequencer`
//! drives any `FrameRenderer` once per scheduled frame, in index order, and
//! yields each image exactly once.

use std::time::Instant;

use tracing::info;

use crate::error::RenderError;
use crate::types::{PixelBuffer, RenderJob};

/// Anything that can turn a sample time into an image.
///
/// `RenderSession` is the real implementation; tests plug in CPU doubles.
/// Every image `draw_frame` returns must be `dimensions()` in size.
pub trait FrameRenderer {
    fn dimensions(&self) -> (u32, u32);
    fn draw_frame(&mut self, time: f32) -> Result<PixelBuffer, RenderError>;
}

/// A frame index and the shader time it samples.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Frame {
    pub index: u64,
    pub time: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameSchedule {
    start_time: f64,
    fps: u32,
    total_frames: u64,
}

impl FrameSchedule {
    pub fn new(start_time: f64, fps: u32, total_frames: u64) -> Self {
        Self {
            start_time,
            fps,
            total_frames,
        }
    }

    pub fn for_job(job: &RenderJob) -> Self {
        Self::new(job.start_time, job.fps, job.total_frames())
    }

    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    /// Sample time of frame `index`: `start_time + index / fps`.
    pub fn time_at(&self, index: u64) -> f64 {
        self.start_time + index as f64 / f64::from(self.fps)
    }

    pub fn frame(&self, index: u64) -> Option<Frame> {
        (index < self.total_frames).then(|| Frame {
            index,
            time: self.time_at(index),
        })
    }

    pub fn frames(&self) -> impl Iterator<Item = Frame> + '_ {
        (0..self.total_frames).map(|index| Frame {
            index,
            time: self.time_at(index),
        })
    }
}

/// A frame paired with the pixels rendered for it.
#[derive(Debug)]
pub struct RenderedFrame {
    pub frame: Frame,
    pub pixels: PixelBuffer,
}

/// Logs completion every `interval` frames and on the final frame.
#[derive(Debug)]
pub struct ProgressReporter {
    total: u64,
    interval: u64,
    started: Instant,
}

impl ProgressReporter {
    pub fn new(total: u64, interval: u64) -> Self {
        Self {
            total,
            interval: interval.max(1),
            started: Instant::now(),
        }
    }

    /// Fraction of frames completed once `completed` frames are done.
    pub fn fraction(&self, completed: u64) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            completed.min(self.total) as f64 / self.total as f64
        }
    }

    pub fn should_report(&self, completed: u64) -> bool {
        completed > 0 && (completed % self.interval == 0 || completed == self.total)
    }

    pub fn record(&self, completed: u64) {
        if !self.should_report(completed) {
            return;
        }
        let elapsed = self.started.elapsed().as_secs_f64();
        let rate = if elapsed > 0.0 {
            completed as f64 / elapsed
        } else {
            0.0
        };
        info!(
            frame = completed,
            total = self.total,
            percent = format_args!("{:.1}", self.fraction(completed) * 100.0),
            fps = format_args!("{rate:.1}"),
            "rendering"
        );
    }
}

/// Finite, non-restartable stream of rendered frames for one job.
///
/// Frames come out strictly in index order. The first render error is yielded
/// once and ends the stream.
pub struct FrameSequencer<'a, R: FrameRenderer + ?Sized> {
    renderer: &'a mut R,
    schedule: FrameSchedule,
    next: u64,
    progress: ProgressReporter,
    finished: bool,
}

impl<'a, R: FrameRenderer + ?Sized> FrameSequencer<'a, R> {
    pub fn new(renderer: &'a mut R, schedule: FrameSchedule) -> Self {
        let progress = ProgressReporter::new(schedule.total_frames(), u64::from(schedule.fps()));
        Self {
            renderer,
            schedule,
            next: 0,
            progress,
            finished: false,
        }
    }

    pub fn for_job(renderer: &'a mut R, job: &RenderJob) -> Self {
        Self::new(renderer, FrameSchedule::for_job(job))
    }

    /// Frames yielded so far.
    pub fn completed(&self) -> u64 {
        self.next
    }
}

impl<R: FrameRenderer + ?Sized> Iterator for FrameSequencer<'_, R> {
    type Item = Result<RenderedFrame, RenderError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let Some(frame) = self.schedule.frame(self.next) else {
            self.finished = true;
            return None;
        };

        let drawn = self.renderer.draw_frame(frame.time as f32).and_then(|pixels| {
            let expected = self.renderer.dimensions();
            if (pixels.width(), pixels.height()) == expected {
                Ok(pixels)
            } else {
                Err(RenderError::readback(format!(
                    "frame {} is {}x{}, expected {}x{}",
                    frame.index,
                    pixels.width(),
                    pixels.height(),
                    expected.0,
                    expected.1
                )))
            }
        });
        match drawn {
            Ok(pixels) => {
                self.next += 1;
                self.progress.record(self.next);
                Some(Ok(RenderedFrame { frame, pixels }))
            }
            Err(err) => {
                self.finished = true;
                Some(Err(err))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.finished {
            return (0, Some(0));
        }
        let remaining = (self.schedule.total_frames() - self.next) as usize;
        (0, Some(remaining))
    }
}

impl<R: FrameRenderer + ?Sized> std::iter::FusedIterator for FrameSequencer<'_, R> {}
