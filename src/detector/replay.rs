//! Pre-computed detections, one line per frame.
//!
//! Each line is `<frame index>:<json array of detections>`. A line without a
//! `:` and frames past the end of the file have no detections.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Lines, Write};
use std::path::Path;

use crate::detection::Detection;
use crate::error::Error;

use super::Detect;

pub struct ReplayDetector<R: BufRead> {
    lines: Lines<R>,
    line_no: usize,
    exhausted: bool,
}

impl ReplayDetector<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        let file = File::open(path)?;
        log::info!("replaying detections from {}", path.display());

        Ok(Self::from_reader(BufReader::new(file)))
    }
}

impl<R: BufRead> ReplayDetector<R> {
    pub fn from_reader(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
            exhausted: false,
        }
    }

    fn next_detections(&mut self) -> Result<Vec<Detection>, Error> {
        let line = match self.lines.next() {
            Some(line) => line?,
            None => {
                if !self.exhausted {
                    log::info!("detections file ended after {} frames", self.line_no);
                    self.exhausted = true;
                }
                return Ok(Vec::new());
            }
        };
        self.line_no += 1;

        parse_line(&line).map_err(|source| Error::Replay {
            line: self.line_no,
            source,
        })
    }
}

impl<F, R: BufRead> Detect<F> for ReplayDetector<R> {
    fn detect(&mut self, _frame: &F) -> Result<Vec<Detection>, Error> {
        self.next_detections()
    }
}

fn parse_line(line: &str) -> Result<Vec<Detection>, serde_json::Error> {
    let line = line.trim();
    if line.starts_with('[') {
        return serde_json::from_str(line);
    }

    match line.find(':') {
        Some(idx) => {
            let (_, vector) = line.split_at(idx + 1);
            serde_json::from_str(vector)
        }
        None => Ok(Vec::new()),
    }
}

/// Formats one replay line.
pub fn format_line(frame_idx: u64, dets: &[Detection]) -> Result<String, Error> {
    let json = serde_json::to_string(dets).map_err(|source| Error::Replay { line: 0, source })?;
    Ok(format!("{}:{}", frame_idx, json))
}

/// Passes detections through while appending them to a replay file.
pub struct DumpingDetector<D, W: Write> {
    inner: D,
    out: W,
    frame_idx: u64,
}

impl<D> DumpingDetector<D, BufWriter<File>> {
    pub fn create<P: AsRef<Path>>(inner: D, path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        let file = File::create(path)?;
        log::info!("dumping detections to {}", path.display());

        Ok(Self::new(inner, BufWriter::new(file)))
    }
}

impl<D, W: Write> DumpingDetector<D, W> {
    pub fn new(inner: D, out: W) -> Self {
        Self {
            inner,
            out,
            frame_idx: 0,
        }
    }

    pub fn into_inner(self) -> (D, W) {
        (self.inner, self.out)
    }
}

impl<F, D: Detect<F>, W: Write> Detect<F> for DumpingDetector<D, W> {
    /// A failed frame is recorded as empty so later lines keep their frame.
    fn detect(&mut self, frame: &F) -> Result<Vec<Detection>, Error> {
        let result = self.inner.detect(frame);
        let dets = result.as_deref().unwrap_or(&[]);

        writeln!(self.out, "{}", format_line(self.frame_idx, dets)?)?;
        self.out.flush()?;
        self.frame_idx += 1;

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn detect(replay: &mut ReplayDetector<Cursor<&str>>) -> Result<Vec<Detection>, Error> {
        Detect::<()>::detect(replay, &())
    }

    #[test]
    fn replays_frames_in_order() {
        let data = "0:[{\"x1\":1,\"y1\":2,\"x2\":3,\"y2\":4,\"label\":\"car\",\"class\":2}]\n\
                    1:[]\n\
                    skipped\n\
                    [{\"x1\":5,\"y1\":6,\"x2\":7,\"y2\":8,\"label\":\"dog\",\"class\":16}]\n";
        let mut replay = ReplayDetector::from_reader(Cursor::new(data));

        assert_eq!(detect(&mut replay).unwrap(), vec![Detection::new(1, 2, 3, 4, "car", 2)]);
        assert!(detect(&mut replay).unwrap().is_empty());
        assert!(detect(&mut replay).unwrap().is_empty());
        assert_eq!(detect(&mut replay).unwrap()[0].label, "dog");
        assert!(detect(&mut replay).unwrap().is_empty());
        assert!(detect(&mut replay).unwrap().is_empty());
    }

    #[test]
    fn reports_line_of_bad_json() {
        let mut replay = ReplayDetector::from_reader(Cursor::new("0:[]\n1:[{oops}]\n"));

        assert!(detect(&mut replay).is_ok());
        match detect(&mut replay) {
            Err(Error::Replay { line, .. }) => assert_eq!(line, 2),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn dump_round_trips_through_replay() {
        let dets = vec![Detection::new(10, 10, 20, 20, "person", 0)];
        let inner = ReplayDetector::from_reader(Cursor::new("0:[]\n"));
        let mut dumping = DumpingDetector::new(inner, Vec::new());

        Detect::<()>::detect(&mut dumping, &()).unwrap();
        let (_, out) = dumping.into_inner();
        let mut text = String::from_utf8(out).unwrap();
        text.push_str(&format_line(1, &dets).unwrap());

        let mut replay = ReplayDetector::from_reader(Cursor::new(text.as_str()));
        assert!(detect(&mut replay).unwrap().is_empty());
        assert_eq!(detect(&mut replay).unwrap(), dets);
    }

    struct Flaky(Vec<Result<Vec<Detection>, Error>>);

    impl Detect<()> for Flaky {
        fn detect(&mut self, _frame: &()) -> Result<Vec<Detection>, Error> {
            self.0.remove(0)
        }
    }

    #[test]
    fn failed_frame_keeps_dump_aligned() {
        let car = Detection::new(1, 2, 3, 4, "car", 2);
        let inner = Flaky(vec![
            Err(Error::Inference("timeout".into())),
            Ok(vec![car.clone()]),
        ]);
        let mut dumping = DumpingDetector::new(inner, Vec::new());

        assert!(Detect::<()>::detect(&mut dumping, &()).is_err());
        assert_eq!(Detect::<()>::detect(&mut dumping, &()).unwrap(), vec![car.clone()]);

        let (_, out) = dumping.into_inner();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("0:[]\n1:"));

        let mut replay = ReplayDetector::from_reader(Cursor::new(text.as_str()));
        assert!(detect(&mut replay).unwrap().is_empty());
        assert_eq!(detect(&mut replay).unwrap(), vec![car]);
    }
}
