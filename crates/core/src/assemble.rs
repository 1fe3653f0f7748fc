//! Stream assembly: start/end-symbol trimming over a chunked text stream.
//!
//! ```text
//! AwaitingStart --start symbol--> Emitting --end symbol--> Broken
//!                                    |
//!                                    +--reducer stop--> Stopped
//! ```
//!
//! `AwaitingStart` is only entered when the task has a start symbol. Symbols
//! may be split across chunks: a trailing partial symbol is carried over to
//! the next chunk instead of being emitted.

use crate::task::StreamCompletion;

/// Assembler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Waiting for the start symbol; content is discarded.
    AwaitingStart,
    /// Fragments are reduced into outputs.
    Emitting,
    /// The reducer asked to stop.
    Stopped,
    /// The end symbol was matched.
    Broken,
}

impl State {
    /// Whether no further output can be produced.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped | Self::Broken)
    }
}

/// Per-invocation assembler. Owns the task cache.
pub struct Assembler<'t, C: StreamCompletion> {
    task: &'t C,
    start: Option<&'t str>,
    end: Option<&'t str>,
    state: State,
    cache: C::Cache,
    /// Text held back because it may be the head of a split symbol.
    pending: String,
    emitted: usize,
}

impl<'t, C: StreamCompletion> Assembler<'t, C> {
    /// Create an assembler for one invocation of `task`.
    pub fn new(task: &'t C) -> Self {
        let start = task.start_symbol().filter(|s| !s.is_empty());
        let end = task.end_symbol().filter(|s| !s.is_empty());
        Self {
            task,
            start,
            end,
            state: if start.is_some() {
                State::AwaitingStart
            } else {
                State::Emitting
            },
            cache: task.initial_cache(),
            pending: String::new(),
            emitted: 0,
        }
    }

    /// Feed the content of one chunk.
    pub fn push(&mut self, content: &str) -> Option<C::Output> {
        match self.state {
            State::Stopped | State::Broken => None,
            State::AwaitingStart => {
                let start = self.start?;
                let mut text = std::mem::take(&mut self.pending);
                text.push_str(content);
                match text.find(start) {
                    Some(pos) => {
                        self.state = State::Emitting;
                        let rest = text.split_off(pos + start.len());
                        self.emit(rest)
                    }
                    None => {
                        let keep = partial_suffix(&text, start);
                        self.pending = text.split_off(text.len() - keep);
                        None
                    }
                }
            }
            State::Emitting => {
                let mut text = std::mem::take(&mut self.pending);
                text.push_str(content);
                self.emit(text)
            }
        }
    }

    /// Flush text held back at the end of the wire sequence.
    pub fn finish(&mut self) -> Option<C::Output> {
        let pending = std::mem::take(&mut self.pending);
        match self.state {
            State::Emitting => self.reduce(&pending),
            _ => None,
        }
    }

    /// Current state.
    pub fn state(&self) -> State {
        self.state
    }

    /// Number of outputs produced so far.
    pub fn emitted(&self) -> usize {
        self.emitted
    }

    /// The task cache.
    pub fn cache(&self) -> &C::Cache {
        &self.cache
    }

    /// Consume the assembler, returning the task cache.
    pub fn into_cache(self) -> C::Cache {
        self.cache
    }

    fn emit(&mut self, mut text: String) -> Option<C::Output> {
        let mut broken = false;
        if let Some(end) = self.end {
            if let Some(pos) = text.find(end) {
                text.truncate(pos);
                broken = true;
            } else {
                let keep = partial_suffix(&text, end);
                self.pending = text.split_off(text.len() - keep);
            }
        }

        let output = self.reduce(&text);
        if broken && self.state == State::Emitting {
            self.state = State::Broken;
        }
        output
    }

    fn reduce(&mut self, fragment: &str) -> Option<C::Output> {
        if fragment.is_empty() {
            return None;
        }

        let step = self.task.reduce(fragment, &mut self.cache);
        if step.stop {
            self.state = State::Stopped;
        }
        if step.output.is_some() {
            self.emitted += 1;
        }
        step.output
    }
}

/// Length of the longest proper prefix of `symbol` that `text` ends with.
fn partial_suffix(text: &str, symbol: &str) -> usize {
    (1..symbol.len())
        .rev()
        .filter(|&k| symbol.is_char_boundary(k))
        .find(|&k| text.ends_with(&symbol[..k]))
        .unwrap_or(0)
}

/// Trim a complete response in text form.
///
/// Drops everything up to and including the last start symbol, then
/// everything from the first end symbol onward.
pub fn trim_symbols(text: &str, start: Option<&str>, end: Option<&str>) -> String {
    let mut text = text;
    if let Some(start) = start.filter(|s| !s.is_empty())
        && let Some(pos) = text.rfind(start)
    {
        text = &text[pos + start.len()..];
    }

    if let Some(end) = end.filter(|s| !s.is_empty())
        && let Some(pos) = text.find(end)
    {
        text = &text[..pos];
    }

    text.to_owned()
}
