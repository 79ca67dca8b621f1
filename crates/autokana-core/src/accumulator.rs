use crate::config::Options;
use crate::kana;
use tracing::{debug, info, trace};

/// Reading text tracked for one source/sink pair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadingState {
    /// Finalized by earlier commits or by a direct sink edit.
    committed: String,
    /// Reading of the segment the IME is still composing.
    pending: String,
    /// What the sink shows.
    displayed: String,
}

impl ReadingState {
    pub fn committed(&self) -> &str {
        &self.committed
    }

    pub fn pending(&self) -> &str {
        &self.pending
    }

    pub fn displayed(&self) -> &str {
        &self.displayed
    }

    pub fn is_empty(&self) -> bool {
        self.committed.is_empty() && self.pending.is_empty() && self.displayed.is_empty()
    }
}

/// Input to the accumulator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadingEvent<'a> {
    /// The IME rewrote its in-progress buffer.
    CompositionUpdate(&'a str),
    /// The IME finalized the current segment.
    CompositionEnd,
    /// Deferred check after a plain edit. Carries the source value at check time.
    SourceEdited(&'a str),
    /// The user typed into the sink directly.
    SinkEdited(&'a str),
}

/// Output decision from the accumulator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Sink keeps whatever it shows.
    Keep,
    /// Sink must show this value.
    SetSink(String),
}

pub struct KanaAccumulator {
    state: ReadingState,
    options: Options,
}

impl Default for KanaAccumulator {
    fn default() -> Self {
        Self::new(Options::default())
    }
}

impl KanaAccumulator {
    pub fn new(options: Options) -> Self {
        Self {
            state: ReadingState::default(),
            options,
        }
    }

    pub fn options(&self) -> Options {
        self.options
    }

    /// Replaces the options. Accumulated reading is kept as is; the new script
    /// applies from the next composition update.
    pub fn set_options(&mut self, options: Options) {
        if self.options != options {
            info!(
                "Accumulator: options changed (script={:?}, clear_on_empty={})",
                options.script, options.clear_on_empty
            );
            self.options = options;
        }
    }

    pub fn state(&self) -> &ReadingState {
        &self.state
    }

    pub fn reading(&self) -> &str {
        &self.state.displayed
    }

    pub fn is_composing(&self) -> bool {
        !self.state.pending.is_empty()
    }

    pub fn on_event(&mut self, event: ReadingEvent<'_>) -> Decision {
        match event {
            ReadingEvent::CompositionUpdate(raw) => self.on_composition_update(raw),
            ReadingEvent::CompositionEnd => {
                self.on_composition_end();
                Decision::Keep
            }
            ReadingEvent::SourceEdited(value) => self.on_source_cleared(value),
            ReadingEvent::SinkEdited(value) => {
                self.on_sink_input(value);
                Decision::Keep
            }
        }
    }

    pub fn on_composition_update(&mut self, raw: &str) -> Decision {
        let kana = kana::extract_reading(raw);

        // Anything outside the syllabary means the IME is showing a conversion
        // candidate, not keystrokes.
        if kana.len() != raw.chars().count() {
            trace!("Ignoring candidate segment {:?}", raw);
            return Decision::Keep;
        }

        self.state.pending = kana::render(&kana, self.options.script);
        self.state.displayed = format!("{}{}", self.state.committed, self.state.pending);
        trace!(
            "Composition: committed={:?} pending={:?}",
            self.state.committed,
            self.state.pending
        );

        Decision::SetSink(self.state.displayed.clone())
    }

    pub fn on_composition_end(&mut self) {
        self.state.committed = self.state.displayed.clone();
        self.state.pending.clear();
        debug!("Committed reading {:?}", self.state.committed);
    }

    /// Runs the clear check for a plain edit. `source_value` must be read after
    /// any composition end dispatched in the same tick.
    pub fn on_source_cleared(&mut self, source_value: &str) -> Decision {
        if !self.options.clear_on_empty {
            return Decision::Keep;
        }
        if !source_value.is_empty() || !self.state.pending.is_empty() {
            return Decision::Keep;
        }

        if !self.state.is_empty() {
            debug!("Source emptied, clearing reading");
        }
        self.state = ReadingState::default();
        Decision::SetSink(String::new())
    }

    /// A manual correction in the sink becomes the new baseline.
    pub fn on_sink_input(&mut self, value: &str) {
        debug!("Sink overridden with {:?}", value);
        self.state.committed = value.to_string();
        self.state.displayed = value.to_string();
        self.state.pending.clear();
    }
}
