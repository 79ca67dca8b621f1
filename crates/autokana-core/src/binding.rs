use crate::accumulator::{Decision, KanaAccumulator, ReadingState};
use crate::config::{Options, OptionsUpdate};
use crate::host::{FieldEvent, FieldEventKind, FieldId, Host, HostError, Subscription};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tracing::{info, trace, warn};

struct Shared {
    accumulator: KanaAccumulator,
    source: FieldId,
    sink: FieldId,
}

impl Shared {
    /// Writes the reading into the sink when it shows something else.
    fn sync_sink(&self, host: &Host, value: &str) {
        match host.value(self.sink) {
            Ok(current) if current == value => {}
            Ok(_) => {
                if let Err(e) = host.set_value(self.sink, value) {
                    warn!("Failed to write reading to sink {}: {}", self.sink, e);
                }
            }
            Err(e) => {
                warn!("Failed to read sink {}: {}", self.sink, e);
            }
        }
    }

    fn apply(&self, host: &Host, decision: Decision) {
        if let Decision::SetSink(value) = decision {
            self.sync_sink(host, &value);
        }
    }
}

/// Mirrors the kana reading of one source field into one sink field.
///
/// Every subscription is owned by the binding and released when it is
/// disposed or dropped. Clear checks deferred before that point do nothing.
pub struct Binding {
    host: Host,
    shared: Arc<Mutex<Shared>>,
    source_sub: Option<Subscription>,
    sink_sub: Option<Subscription>,
}

impl Binding {
    pub fn bind(
        host: &Host,
        source: FieldId,
        sink: FieldId,
        options: Options,
    ) -> Result<Self, HostError> {
        if source == sink {
            return Err(HostError::SameField(source));
        }
        for id in [source, sink] {
            if !host.has_field(id) {
                return Err(HostError::UnknownField(id));
            }
        }

        let shared = Arc::new(Mutex::new(Shared {
            accumulator: KanaAccumulator::new(options),
            source,
            sink,
        }));

        let source_sub = host.subscribe(source, source_listener(Arc::downgrade(&shared)))?;
        let sink_sub = host.subscribe(sink, sink_listener(Arc::downgrade(&shared)))?;

        info!(
            "Binding: source {} -> sink {} (script={:?}, clear_on_empty={})",
            source, sink, options.script, options.clear_on_empty
        );

        Ok(Self {
            host: host.clone(),
            shared,
            source_sub: Some(source_sub),
            sink_sub: Some(sink_sub),
        })
    }

    pub fn source(&self) -> FieldId {
        self.shared.lock().source
    }

    pub fn sink(&self) -> FieldId {
        self.shared.lock().sink
    }

    pub fn reading(&self) -> String {
        self.shared.lock().accumulator.reading().to_string()
    }

    pub fn state(&self) -> ReadingState {
        self.shared.lock().accumulator.state().clone()
    }

    pub fn options(&self) -> Options {
        self.shared.lock().accumulator.options()
    }

    /// Swaps the whole option set. The accumulated reading survives.
    pub fn set_options(&self, options: Options) {
        self.shared.lock().accumulator.set_options(options);
    }

    /// Changes only the keys present in `update` and returns the result.
    pub fn update(&self, update: OptionsUpdate) -> Options {
        let mut shared = self.shared.lock();
        let options = shared.accumulator.options().merged(update);
        shared.accumulator.set_options(options);
        options
    }

    /// Moves the sink to another field and shows the current reading there.
    pub fn set_sink(&mut self, sink: FieldId) -> Result<(), HostError> {
        let source = self.source();
        if sink == source {
            return Err(HostError::SameField(sink));
        }
        if sink == self.sink() {
            return Ok(());
        }

        let sub = self
            .host
            .subscribe(sink, sink_listener(Arc::downgrade(&self.shared)))?;
        // Old subscription goes first so the previous sink stops feeding back.
        drop(self.sink_sub.replace(sub));

        let mut shared = self.shared.lock();
        info!("Binding: sink {} -> {}", shared.sink, sink);
        shared.sink = sink;
        let reading = shared.accumulator.reading().to_string();
        shared.sync_sink(&self.host, &reading);
        Ok(())
    }

    pub fn is_bound(&self) -> bool {
        self.source_sub.as_ref().is_some_and(Subscription::is_active)
            && self.sink_sub.as_ref().is_some_and(Subscription::is_active)
    }

    /// Releases both subscriptions. Same as dropping the binding.
    pub fn dispose(self) {}

    fn release(&mut self) {
        let had_any = self.source_sub.is_some() || self.sink_sub.is_some();
        self.source_sub.take();
        self.sink_sub.take();
        if had_any {
            let shared = self.shared.lock();
            info!("Binding: released source {} / sink {}", shared.source, shared.sink);
        }
    }
}

impl Drop for Binding {
    fn drop(&mut self) {
        self.release();
    }
}

fn source_listener(shared: Weak<Mutex<Shared>>) -> impl Fn(&Host, &FieldEvent) + Send + Sync {
    move |host, event| {
        let Some(strong) = shared.upgrade() else {
            return;
        };

        match &event.kind {
            FieldEventKind::CompositionStart => {
                trace!("Composition started on {}", event.target);
            }
            FieldEventKind::CompositionUpdate { data } => {
                let mut s = strong.lock();
                let decision = s.accumulator.on_composition_update(data);
                s.apply(host, decision);
            }
            FieldEventKind::CompositionEnd { .. } => {
                strong.lock().accumulator.on_composition_end();
            }
            FieldEventKind::Input { .. } | FieldEventKind::KeyUp => {
                if !strong.lock().accumulator.options().clear_on_empty {
                    return;
                }
                // A composition end fired in the same tick must land first.
                let shared = shared.clone();
                host.defer(move |host| run_clear_check(host, &shared));
            }
        }
    }
}

fn run_clear_check(host: &Host, shared: &Weak<Mutex<Shared>>) {
    let Some(strong) = shared.upgrade() else {
        trace!("Clear check dropped: binding disposed");
        return;
    };
    let mut s = strong.lock();
    let value = match host.value(s.source) {
        Ok(v) => v,
        Err(e) => {
            warn!("Clear check could not read source {}: {}", s.source, e);
            return;
        }
    };
    let decision = s.accumulator.on_source_cleared(&value);
    s.apply(host, decision);
}

fn sink_listener(shared: Weak<Mutex<Shared>>) -> impl Fn(&Host, &FieldEvent) + Send + Sync {
    move |_host, event| {
        let Some(strong) = shared.upgrade() else {
            return;
        };
        if let FieldEventKind::Input { value } = &event.kind {
            strong.lock().accumulator.on_sink_input(value);
        }
    }
}
