use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::canvas::Canvas;
use crate::clock::{Clock, SystemClock};
use crate::detector::Detect;
use crate::error::Error;
use crate::processor::FrameProcessor;

/// Properties a source reports once it is open.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamInfo {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
}

impl StreamInfo {
    /// File sinks need both dimensions, zero means the source could not be read.
    pub fn ensure_dimensions(&self) -> Result<(), Error> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::InvalidDimensions {
                width: self.width,
                height: self.height,
            });
        }

        Ok(())
    }
}

pub trait FrameSource {
    type Frame;

    fn info(&self) -> StreamInfo;

    /// `Ok(None)` once the stream is exhausted.
    fn next_frame(&mut self) -> Result<Option<Self::Frame>, Error>;

    fn release(&mut self) {}
}

pub trait FrameSink<F> {
    fn write(&mut self, frame: &F) -> Result<(), Error>;

    /// Non-blocking check for a user request to stop, polled once per frame.
    fn poll_cancel(&mut self) -> Result<bool, Error> {
        Ok(false)
    }

    fn release(&mut self) -> Result<(), Error> {
        Ok(())
    }
}

/// Forwards every frame to each inner sink in order.
pub struct Sinks<F> {
    sinks: Vec<Box<dyn FrameSink<F>>>,
}

impl<F> Sinks<F> {
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    pub fn push<S: FrameSink<F> + 'static>(&mut self, sink: S) {
        self.sinks.push(Box::new(sink));
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl<F> Default for Sinks<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F> FrameSink<F> for Sinks<F> {
    fn write(&mut self, frame: &F) -> Result<(), Error> {
        for sink in &mut self.sinks {
            sink.write(frame)?;
        }
        Ok(())
    }

    fn poll_cancel(&mut self) -> Result<bool, Error> {
        let mut cancelled = false;
        for sink in &mut self.sinks {
            cancelled |= sink.poll_cancel()?;
        }
        Ok(cancelled)
    }

    /// Releases every sink even if one of them fails, reporting the first error.
    fn release(&mut self) -> Result<(), Error> {
        let mut result = Ok(());
        for sink in &mut self.sinks {
            if let Err(err) = sink.release() {
                if result.is_ok() {
                    result = Err(err);
                }
            }
        }
        result
    }
}

impl<F, S: FrameSink<F> + ?Sized> FrameSink<F> for Box<S> {
    fn write(&mut self, frame: &F) -> Result<(), Error> {
        (**self).write(frame)
    }

    fn poll_cancel(&mut self) -> Result<bool, Error> {
        (**self).poll_cancel()
    }

    fn release(&mut self) -> Result<(), Error> {
        (**self).release()
    }
}

/// Process wide stop request, set from a signal handler.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Idle,
    Running,
    Ended,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    Exhausted,
    ReadError,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub frames: u64,
    pub detections: u64,
    pub end: EndReason,
}

/// Pulls frames from a source through the processor into a sink until the
/// stream ends or a stop is requested.
pub struct Pipeline<D, K: Clock = SystemClock> {
    processor: FrameProcessor<K>,
    detector: D,
    state: DriverState,
}

impl<D, K: Clock> Pipeline<D, K> {
    pub fn new(processor: FrameProcessor<K>, detector: D) -> Self {
        Self {
            processor,
            detector,
            state: DriverState::Idle,
        }
    }

    #[inline]
    pub fn state(&self) -> DriverState {
        self.state
    }

    #[inline]
    pub fn processor(&self) -> &FrameProcessor<K> {
        &self.processor
    }

    /// Runs the pipeline once.
    ///
    /// `open_sink` receives the source's stream properties. Whatever happens, the
    /// source and sink are released before returning.
    pub fn run<S, O, C, T>(
        &mut self,
        open_source: O,
        open_sink: C,
        cancel: &CancelToken,
    ) -> Result<RunSummary, Error>
    where
        S: FrameSource,
        S::Frame: Canvas,
        D: Detect<S::Frame>,
        T: FrameSink<S::Frame>,
        O: FnOnce() -> Result<S, Error>,
        C: FnOnce(&StreamInfo) -> Result<T, Error>,
    {
        if self.state != DriverState::Idle {
            return Err(Error::InvalidState(self.state));
        }

        let mut source = match open_source() {
            Ok(source) => source,
            Err(err) => {
                log::error!("failed to open source: {}", err);
                self.state = DriverState::Failed;
                return Err(err);
            }
        };

        let info = source.info();
        log::info!(
            "source opened: {}x{} @ {:.2} fps",
            info.width,
            info.height,
            info.fps
        );

        let mut sink = match open_sink(&info) {
            Ok(sink) => sink,
            Err(err) => {
                log::error!("failed to open sink: {}", err);
                source.release();
                self.state = DriverState::Failed;
                return Err(err);
            }
        };

        self.state = DriverState::Running;
        let result = self.drive(&mut source, &mut sink, cancel);

        source.release();
        let released = sink.release();

        match (result, released) {
            (Ok(summary), Ok(())) => {
                self.state = DriverState::Ended;
                log::info!(
                    "processing complete ({:?}): {} frames, {} detections",
                    summary.end,
                    summary.frames,
                    summary.detections
                );
                Ok(summary)
            }
            (Err(err), _) | (Ok(_), Err(err)) => {
                self.state = DriverState::Failed;
                log::error!("pipeline failed: {}", err);
                Err(err)
            }
        }
    }

    fn drive<S, T>(
        &mut self,
        source: &mut S,
        sink: &mut T,
        cancel: &CancelToken,
    ) -> Result<RunSummary, Error>
    where
        S: FrameSource,
        S::Frame: Canvas,
        D: Detect<S::Frame>,
        T: FrameSink<S::Frame>,
    {
        let mut frames = 0;
        let mut detections = 0;

        let end = loop {
            let mut frame = match source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break EndReason::Exhausted,
                Err(err) => {
                    log::warn!("frame read failed, stopping: {}", err);
                    break EndReason::ReadError;
                }
            };

            let report = self.processor.process(&mut frame, &mut self.detector)?;
            frames += 1;
            detections += report.detections as u64;

            sink.write(&frame)?;

            if sink.poll_cancel()? || cancel.is_cancelled() {
                log::info!("cancellation requested after frame {}", frames);
                break EndReason::Cancelled;
            }
        };

        Ok(RunSummary {
            frames,
            detections,
            end,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::Detection;
    use crate::processor::tests::{Scripted, StepClock};
    use crate::render::tests::RecordingCanvas;
    use crate::speed::Calibration;
    use crate::style::StyleProfile;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;
    use std::time::Duration;

    #[derive(Default)]
    struct Log {
        source_released: u32,
        sink_released: u32,
        written: u32,
    }

    struct MockSource {
        frames: VecDeque<Result<Option<RecordingCanvas>, Error>>,
        info: StreamInfo,
        log: Rc<RefCell<Log>>,
    }

    impl FrameSource for MockSource {
        type Frame = RecordingCanvas;

        fn info(&self) -> StreamInfo {
            self.info
        }

        fn next_frame(&mut self) -> Result<Option<RecordingCanvas>, Error> {
            self.frames.pop_front().unwrap_or(Ok(None))
        }

        fn release(&mut self) {
            self.log.borrow_mut().source_released += 1;
        }
    }

    struct MockSink {
        cancel_after: Option<u32>,
        fail_write: bool,
        log: Rc<RefCell<Log>>,
    }

    impl FrameSink<RecordingCanvas> for MockSink {
        fn write(&mut self, _frame: &RecordingCanvas) -> Result<(), Error> {
            if self.fail_write {
                return Err(Error::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk full")));
            }
            self.log.borrow_mut().written += 1;
            Ok(())
        }

        fn poll_cancel(&mut self) -> Result<bool, Error> {
            Ok(self.cancel_after == Some(self.log.borrow().written))
        }

        fn release(&mut self) -> Result<(), Error> {
            self.log.borrow_mut().sink_released += 1;
            Ok(())
        }
    }

    const INFO: StreamInfo = StreamInfo {
        width: 640,
        height: 480,
        fps: 30.0,
    };

    fn pipeline(script: Vec<Vec<Detection>>) -> Pipeline<Scripted, StepClock> {
        let processor = FrameProcessor::with_clock(
            StyleProfile::plain(),
            Calibration::default(),
            StepClock::new(Duration::from_millis(100)),
        );
        Pipeline::new(processor, Scripted(script.into_iter().map(Ok).collect()))
    }

    fn source(n: usize, log: &Rc<RefCell<Log>>) -> MockSource {
        MockSource {
            frames: (0..n).map(|_| Ok(Some(RecordingCanvas::default()))).collect(),
            info: INFO,
            log: log.clone(),
        }
    }

    fn sink(log: &Rc<RefCell<Log>>) -> MockSink {
        MockSink {
            cancel_after: None,
            fail_write: false,
            log: log.clone(),
        }
    }

    #[test]
    fn runs_until_source_is_exhausted() {
        let log = Rc::new(RefCell::new(Log::default()));
        let det = Detection::new(0, 0, 10, 10, "car", 2);
        let mut p = pipeline(vec![vec![det.clone()], vec![], vec![det.clone(), det]]);
        assert_eq!(p.state(), DriverState::Idle);

        let summary = p
            .run(|| Ok(source(3, &log)), |_| Ok(sink(&log)), &CancelToken::new())
            .unwrap();

        assert_eq!(
            summary,
            RunSummary {
                frames: 3,
                detections: 3,
                end: EndReason::Exhausted
            }
        );
        assert_eq!(p.state(), DriverState::Ended);
        let log = log.borrow();
        assert_eq!((log.written, log.source_released, log.sink_released), (3, 1, 1));
    }

    #[test]
    fn second_run_is_rejected() {
        let log = Rc::new(RefCell::new(Log::default()));
        let mut p = pipeline(vec![]);

        p.run(|| Ok(source(1, &log)), |_| Ok(sink(&log)), &CancelToken::new())
            .unwrap();
        let again = p.run(|| Ok(source(1, &log)), |_| Ok(sink(&log)), &CancelToken::new());

        assert!(matches!(again, Err(Error::InvalidState(DriverState::Ended))));
        assert_eq!(log.borrow().source_released, 1);
    }

    #[test]
    fn read_error_ends_the_stream() {
        let log = Rc::new(RefCell::new(Log::default()));
        let mut p = pipeline(vec![]);
        let mut src = source(1, &log);
        src.frames
            .push_back(Err(Error::Io(std::io::Error::new(std::io::ErrorKind::Other, "corrupt"))));
        src.frames.push_back(Ok(Some(RecordingCanvas::default())));

        let summary = p
            .run(move || Ok(src), |_| Ok(sink(&log)), &CancelToken::new())
            .unwrap();

        assert_eq!(summary.frames, 1);
        assert_eq!(summary.end, EndReason::ReadError);
        assert_eq!(p.state(), DriverState::Ended);
    }

    #[test]
    fn sink_key_cancels_after_frame() {
        let log = Rc::new(RefCell::new(Log::default()));
        let mut p = pipeline(vec![]);
        let mut s = sink(&log);
        s.cancel_after = Some(2);

        let summary = p
            .run(|| Ok(source(10, &log)), move |_| Ok(s), &CancelToken::new())
            .unwrap();

        assert_eq!(summary.frames, 2);
        assert_eq!(summary.end, EndReason::Cancelled);
        assert_eq!(log.borrow().source_released, 1);
        assert_eq!(log.borrow().sink_released, 1);
    }

    #[test]
    fn cancel_token_is_polled_per_frame() {
        let log = Rc::new(RefCell::new(Log::default()));
        let mut p = pipeline(vec![]);
        let cancel = CancelToken::new();
        cancel.cancel();

        let summary = p
            .run(|| Ok(source(10, &log)), |_| Ok(sink(&log)), &cancel)
            .unwrap();

        // the frame in flight is still finished and written
        assert_eq!(summary.frames, 1);
        assert_eq!(log.borrow().written, 1);
        assert_eq!(summary.end, EndReason::Cancelled);
    }

    #[test]
    fn unopenable_source_fails() {
        let log = Rc::new(RefCell::new(Log::default()));
        let mut p = pipeline(vec![]);

        let result = p.run(
            || -> Result<MockSource, Error> { Err(Error::SourceUnavailable("camera:3".into())) },
            |_| Ok(sink(&log)),
            &CancelToken::new(),
        );

        assert!(matches!(result, Err(Error::SourceUnavailable(_))));
        assert_eq!(p.state(), DriverState::Failed);
        assert_eq!(log.borrow().sink_released, 0);
    }

    #[test]
    fn zero_dimensions_fail_and_release_source() {
        let log = Rc::new(RefCell::new(Log::default()));
        let mut p = pipeline(vec![]);
        let mut src = source(3, &log);
        src.info.width = 0;

        let result = p.run(
            move || Ok(src),
            |info| {
                info.ensure_dimensions()?;
                Ok(sink(&log))
            },
            &CancelToken::new(),
        );

        assert!(matches!(
            result,
            Err(Error::InvalidDimensions {
                width: 0,
                height: 480
            })
        ));
        assert_eq!(p.state(), DriverState::Failed);
        assert_eq!(log.borrow().source_released, 1);
        assert_eq!(log.borrow().written, 0);
    }

    #[test]
    fn sink_failure_releases_everything() {
        let log = Rc::new(RefCell::new(Log::default()));
        let mut p = pipeline(vec![]);
        let mut s = sink(&log);
        s.fail_write = true;

        let result = p.run(|| Ok(source(3, &log)), move |_| Ok(s), &CancelToken::new());

        assert!(matches!(result, Err(Error::Io(_))));
        assert_eq!(p.state(), DriverState::Failed);
        assert_eq!(log.borrow().source_released, 1);
        assert_eq!(log.borrow().sink_released, 1);
    }

    #[test]
    fn render_failure_mid_run_releases_everything() {
        let log = Rc::new(RefCell::new(Log::default()));
        let det = Detection::new(0, 0, 10, 10, "car", 2);
        let mut p = pipeline(vec![vec![], vec![det]]);
        let mut src = source(1, &log);
        src.frames.push_back(Ok(Some(RecordingCanvas {
            broken: true,
            ..Default::default()
        })));
        src.frames.push_back(Ok(Some(RecordingCanvas::default())));

        let result = p.run(move || Ok(src), |_| Ok(sink(&log)), &CancelToken::new());

        assert!(matches!(result, Err(Error::Unsupported(_))));
        assert_eq!(p.state(), DriverState::Failed);
        let log = log.borrow();
        assert_eq!((log.written, log.source_released, log.sink_released), (1, 1, 1));
    }

    #[test]
    fn fan_out_writes_to_every_sink() {
        let log = Rc::new(RefCell::new(Log::default()));
        let mut sinks: Sinks<RecordingCanvas> = Sinks::new();
        sinks.push(sink(&log));
        sinks.push(sink(&log));
        assert_eq!(sinks.len(), 2);

        sinks.write(&RecordingCanvas::default()).unwrap();
        assert!(!sinks.poll_cancel().unwrap());
        sinks.release().unwrap();

        assert_eq!(log.borrow().written, 2);
        assert_eq!(log.borrow().sink_released, 2);
    }
}
