/// Receiver of coarse progress of long scans.
/// Reports are advisory and never affect the scan itself.
pub trait ProgressSink {
    fn progress(&mut self, task: &str, percent: u8);

    fn done(&mut self, _task: &str) {}
}

/// Sink discarding all reports.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    #[inline]
    fn progress(&mut self, _task: &str, _percent: u8) {}
}

/// Tracks progress of one task and forwards a report only when the
/// percentage changes.
pub struct ProgressMeter<'a> {
    sink: &'a mut dyn ProgressSink,
    task: &'a str,
    total: usize,
    last: Option<u8>,
}

impl<'a> ProgressMeter<'a> {
    #[inline]
    pub fn new(sink: &'a mut dyn ProgressSink, task: &'a str, total: usize) -> Self {
        ProgressMeter {
            sink,
            task,
            total,
            last: None,
        }
    }

    #[inline]
    pub fn update(&mut self, current: usize) {
        if self.total == 0 {
            return;
        }
        let percent = (current.min(self.total) * 100 / self.total) as u8;
        if self.last != Some(percent) {
            self.last = Some(percent);
            self.sink.progress(self.task, percent);
        }
    }

    #[inline]
    pub fn finish(self) {
        self.sink.done(self.task);
    }
}
