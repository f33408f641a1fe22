//! Progress reporting for long-running searches.
//!
//! A [`Logger`] forwards [`Progress`] records to an optional
//! [`ProgressSink`]. Each call may hand back a replacement sink that receives
//! the next record. Reporting never affects control flow.

use std::fmt;

/// A trial value paired with its score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredValue {
    pub value: f64,
    pub score: f64,
}

impl ScoredValue {
    #[inline]
    pub fn new(value: f64, score: f64) -> Self {
        Self { value, score }
    }
}

/// State of a three-point search bracket at one step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BracketSnapshot {
    pub low: ScoredValue,
    pub winning: ScoredValue,
    pub high: ScoredValue,
    /// Point scored during this step, if any.
    pub new: Option<ScoredValue>,
}

/// One progress record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress<'a> {
    pub msg: &'a str,
    pub iteration: Option<usize>,
    pub num_of_iterations: Option<usize>,
    pub value: Option<f64>,
    pub score: Option<f64>,
    pub bracket: Option<BracketSnapshot>,
}

impl<'a> Progress<'a> {
    pub fn new(msg: &'a str) -> Self {
        Self {
            msg,
            iteration: None,
            num_of_iterations: None,
            value: None,
            score: None,
            bracket: None,
        }
    }

    pub fn with_iteration(mut self, iteration: usize, num_of_iterations: Option<usize>) -> Self {
        self.iteration = Some(iteration);
        self.num_of_iterations = num_of_iterations;
        self
    }

    pub fn with_scored(mut self, scored: ScoredValue) -> Self {
        self.value = Some(scored.value);
        self.score = Some(scored.score);
        self
    }

    pub fn with_bracket(mut self, bracket: BracketSnapshot) -> Self {
        self.bracket = Some(bracket);
        self
    }
}

impl fmt::Display for Progress<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.msg)?;
        match (self.iteration, self.num_of_iterations) {
            (Some(i), Some(n)) => write!(f, " [{}/{}]", i, n)?,
            (Some(i), None) => write!(f, " [{}]", i)?,
            _ => {}
        }
        if let Some(value) = self.value {
            write!(f, " value={:.6}", value)?;
        }
        if let Some(score) = self.score {
            write!(f, " score={:.6}", score)?;
        }
        if let Some(b) = &self.bracket {
            write!(
                f,
                " bracket=({:.6}, {:.6}, {:.6})",
                b.low.value, b.winning.value, b.high.value
            )?;
        }
        Ok(())
    }
}

/// Receiver of progress records.
pub trait ProgressSink {
    /// Handles one record. Returning `Some` replaces this sink for the next
    /// record; `None` keeps it.
    fn emit(&mut self, progress: &Progress<'_>) -> Option<Box<dyn ProgressSink>>;
}

struct FnSink<F>(F);

impl<F> ProgressSink for FnSink<F>
where
    F: FnMut(&Progress<'_>),
{
    fn emit(&mut self, progress: &Progress<'_>) -> Option<Box<dyn ProgressSink>> {
        (self.0)(progress);
        None
    }
}

/// Forwards records to the `log` facade at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogFacadeSink;

impl ProgressSink for LogFacadeSink {
    fn emit(&mut self, progress: &Progress<'_>) -> Option<Box<dyn ProgressSink>> {
        log::debug!("{}", progress);
        None
    }
}

/// Optional progress sink with continuation.
///
/// [`Logger::none`] costs one branch per call; records passed through
/// [`log_with`](Self::log_with) are never built when disabled.
#[derive(Default)]
pub struct Logger {
    sink: Option<Box<dyn ProgressSink>>,
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

impl Logger {
    /// No logging.
    pub fn none() -> Self {
        Self { sink: None }
    }

    pub fn new(sink: impl ProgressSink + 'static) -> Self {
        Self {
            sink: Some(Box::new(sink)),
        }
    }

    /// Logger calling `f` for every record.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: FnMut(&Progress<'_>) + 'static,
    {
        Self::new(FnSink(f))
    }

    /// Logger writing every record to `log::debug!`.
    pub fn log_facade() -> Self {
        Self::new(LogFacadeSink)
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.sink.is_some()
    }

    /// Sends one record to the sink, swapping in any replacement it returns.
    #[inline]
    pub fn log(&mut self, progress: &Progress<'_>) {
        if let Some(sink) = self.sink.as_mut() {
            if let Some(next) = sink.emit(progress) {
                self.sink = Some(next);
            }
        }
    }

    /// Like [`log`](Self::log) but only builds the record when enabled.
    #[inline]
    pub fn log_with<'a, F>(&mut self, build: F)
    where
        F: FnOnce() -> Progress<'a>,
    {
        if self.sink.is_some() {
            let progress = build();
            self.log(&progress);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_none_never_builds_records() {
        let mut logger = Logger::none();
        assert!(!logger.is_enabled());
        logger.log_with(|| panic!("record built for a disabled logger"));
    }

    #[test]
    fn test_from_fn_receives_fields() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let mut logger = Logger::from_fn(move |p| {
            sink.borrow_mut().push((p.msg.to_string(), p.iteration, p.value));
        });
        logger.log(
            &Progress::new("step")
                .with_iteration(3, Some(10))
                .with_scored(ScoredValue::new(1.5, -2.0)),
        );
        let seen = seen.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0], ("step".to_string(), Some(3), Some(1.5)));
    }

    struct Counting {
        calls: Rc<RefCell<Vec<&'static str>>>,
        name: &'static str,
        replacement: Option<&'static str>,
    }

    impl ProgressSink for Counting {
        fn emit(&mut self, _progress: &Progress<'_>) -> Option<Box<dyn ProgressSink>> {
            self.calls.borrow_mut().push(self.name);
            self.replacement.take().map(|name| {
                Box::new(Counting {
                    calls: Rc::clone(&self.calls),
                    name,
                    replacement: None,
                }) as Box<dyn ProgressSink>
            })
        }
    }

    #[test]
    fn test_sink_can_replace_itself() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let mut logger = Logger::new(Counting {
            calls: Rc::clone(&calls),
            name: "first",
            replacement: Some("second"),
        });
        for _ in 0..3 {
            logger.log(&Progress::new("tick"));
        }
        assert_eq!(*calls.borrow(), vec!["first", "second", "second"]);
    }

    #[test]
    fn test_display() {
        let p = Progress::new("honing")
            .with_iteration(2, Some(5))
            .with_scored(ScoredValue::new(3.5, 10.0));
        assert_eq!(p.to_string(), "honing [2/5] value=3.500000 score=10.000000");
    }
}
