//! The 4-state lifecycle every stream filter in this crate follows, and the
//! `Filter` trait that lets them be composed without caring what's underneath.

use thiserror::Error;

/// Upper bound on how many bytes a single filter will hold before it must
/// have been read. Guards a blocked downstream filter from growing a
/// buffer without bound.
pub const MAX_BUFFER: usize = 1_000_000;

/// Lifecycle state of a [`Filter`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FilterState {
    /// Initial state, or just reset: no bytes have been written since the
    /// last read.
    Empty,
    /// A pattern has been partially recognized; more bytes are needed.
    Waiting,
    /// Output is available and must be read before the next write.
    Pass,
    /// Output has been read; the filter must be reset before writing again.
    Flushed,
}

/// Errors a [`Filter`] can report from `write` or `read`.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum FilterError {
    /// `write` was called while the filter still holds unread output.
    #[error("filter is in pass state and must be read before writing")]
    MustRead,
    /// `write` was called after `read` without an intervening `reset`.
    #[error("filter must be reset before writing again")]
    MustReset,
    /// The filter's buffer reached [`MAX_BUFFER`] without reaching a state
    /// boundary.
    #[error("filter buffer is full")]
    Full,
    /// `read` was called on a filter with nothing to return.
    #[error("empty filter cannot be read")]
    EmptyRead,
    /// `read` was called while the filter is still waiting on more input.
    #[error("waiting filter cannot be read")]
    WaitingRead,
    /// A filter inside a pipeline never produced output, leaving the outer
    /// filter with no way to make forward progress.
    #[error("filter is blocked indefinitely because its internal filter has blocked")]
    Stuck,
    /// A fixed pattern failed to compile (never expected outside tests).
    #[error("pattern failed to compile: {0}")]
    Pattern(#[from] stepregex::RegexError),
}

/// Validates that a write is legal in `state` given a buffer already holding
/// `buffer_len` bytes. Filters that keep their own buffer (rather than
/// embedding a [`FilterCore`]) call this directly.
pub fn guard_write(state: FilterState, buffer_len: usize) -> Result<(), FilterError> {
    match state {
        FilterState::Flushed => Err(FilterError::MustReset),
        FilterState::Pass => Err(FilterError::MustRead),
        FilterState::Empty | FilterState::Waiting => {
            if buffer_len >= MAX_BUFFER {
                Err(FilterError::Full)
            } else {
                Ok(())
            }
        }
    }
}

/// Validates that a read is legal in `state`.
pub fn guard_read(state: FilterState) -> Result<(), FilterError> {
    match state {
        FilterState::Empty => Err(FilterError::EmptyRead),
        FilterState::Waiting => Err(FilterError::WaitingRead),
        FilterState::Pass | FilterState::Flushed => Ok(()),
    }
}

/// Shared bookkeeping embedded in every concrete filter: the lifecycle state
/// and the byte-at-a-time input buffer, plus the guard checks the legacy
/// reference enforces on every `write`/`read` call.
#[derive(Debug, Default)]
pub struct FilterCore {
    state_: FilterCoreState,
    /// Raw bytes accumulated since the last reset.
    pub buffer: Vec<u8>,
}

#[derive(Debug, Default, Clone, Copy, Eq, PartialEq)]
enum FilterCoreState {
    #[default]
    Empty,
    Waiting,
    Pass,
    Flushed,
}

impl From<FilterCoreState> for FilterState {
    fn from(s: FilterCoreState) -> Self {
        match s {
            FilterCoreState::Empty => FilterState::Empty,
            FilterCoreState::Waiting => FilterState::Waiting,
            FilterCoreState::Pass => FilterState::Pass,
            FilterCoreState::Flushed => FilterState::Flushed,
        }
    }
}

impl FilterCore {
    /// Returns a fresh core in [`FilterState::Empty`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates that a write is currently legal (state is not `Pass` or
    /// `Flushed`, buffer has room), without touching the buffer itself.
    pub fn guard_write(&mut self) -> Result<(), FilterError> {
        guard_write(self.state_.into(), self.buffer.len())
    }

    /// Validates that a byte may be written and appends it to the buffer.
    pub fn begin_write(&mut self, c: u8) -> Result<(), FilterError> {
        self.guard_write()?;
        self.buffer.push(c);
        Ok(())
    }

    /// Sets the state after a successful write.
    pub fn set_state(&mut self, state: FilterState) {
        self.state_ = match state {
            FilterState::Empty => FilterCoreState::Empty,
            FilterState::Waiting => FilterCoreState::Waiting,
            FilterState::Pass => FilterCoreState::Pass,
            FilterState::Flushed => FilterCoreState::Flushed,
        };
    }

    /// Validates that the filter may be read and transitions to
    /// [`FilterState::Flushed`].
    pub fn begin_read(&mut self) -> Result<(), FilterError> {
        guard_read(self.state_.into())?;
        self.state_ = FilterCoreState::Flushed;
        Ok(())
    }

    /// Restores [`FilterState::Empty`] and clears the buffer.
    pub fn reset(&mut self) {
        self.state_ = FilterCoreState::Empty;
        self.buffer.clear();
    }

    /// Current lifecycle state.
    pub fn state(&self) -> FilterState {
        self.state_.into()
    }
}

/// A single-character transformation stage of a filter pipeline.
///
/// Every concrete filter (a permutation coder, a body extractor, a
/// passthrough stage) exposes this one capability set instead of an
/// inheritance hierarchy, so `SerialFilterGroup` can drive heterogeneous
/// filters identically.
pub trait Filter {
    /// Feeds one byte in, returning the filter's state after processing it.
    fn write(&mut self, c: u8) -> Result<FilterState, FilterError>;
    /// Returns the filter's accumulated output. Only valid in
    /// [`FilterState::Pass`] or [`FilterState::Flushed`].
    fn read(&mut self) -> Result<Vec<u8>, FilterError>;
    /// Restores [`FilterState::Empty`], discarding any buffered state.
    fn reset(&mut self);
    /// Current lifecycle state.
    fn state(&self) -> FilterState;
}

/// Always-passing filter that performs no transformation; used to terminate
/// a pipeline stage that needs a `Filter` but no steganographic coding.
#[derive(Default)]
pub struct NullFilter {
    core: FilterCore,
}

impl NullFilter {
    /// Returns a new, empty null filter.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Filter for NullFilter {
    fn write(&mut self, c: u8) -> Result<FilterState, FilterError> {
        self.core.begin_write(c)?;
        self.core.set_state(FilterState::Pass);
        Ok(FilterState::Pass)
    }

    fn read(&mut self) -> Result<Vec<u8>, FilterError> {
        self.core.begin_read()?;
        Ok(std::mem::take(&mut self.core.buffer))
    }

    fn reset(&mut self) {
        self.core.reset();
    }

    fn state(&self) -> FilterState {
        self.core.state()
    }
}

/// Composes filters so that the output of each feeds the next: a byte fed to
/// the group passes through filter 1, whatever filter 1 produces (if any)
/// feeds filter 2, and so on, with each intermediate filter auto-reset right
/// after it is drained. The group is `Pass` once every stage has produced
/// (and forwarded) output for the current byte; it is `Waiting` if any stage
/// is still accumulating.
#[derive(Default)]
pub struct SerialFilterGroup {
    core: FilterCore,
    filters: Vec<Box<dyn Filter>>,
}

impl SerialFilterGroup {
    /// Builds a group that drives `filters` in order.
    pub fn new(filters: Vec<Box<dyn Filter>>) -> Self {
        Self {
            core: FilterCore::new(),
            filters,
        }
    }
}

impl Filter for SerialFilterGroup {
    fn write(&mut self, c: u8) -> Result<FilterState, FilterError> {
        self.core.guard_write()?;

        let mut stage_in: Vec<u8> = vec![c];
        for filter in &mut self.filters {
            let mut stage_out = Vec::new();
            for byte in stage_in {
                if filter.write(byte)? == FilterState::Pass {
                    stage_out.extend(filter.read()?);
                    filter.reset();
                }
            }
            stage_in = stage_out;
        }
        self.core.buffer.extend(stage_in);

        let waiting = self.filters.iter().any(|f| f.state() == FilterState::Waiting);
        let state = if waiting { FilterState::Waiting } else { FilterState::Pass };
        self.core.set_state(state);
        Ok(state)
    }

    fn read(&mut self) -> Result<Vec<u8>, FilterError> {
        self.core.begin_read()?;
        Ok(std::mem::take(&mut self.core.buffer))
    }

    fn reset(&mut self) {
        self.core.reset();
        for filter in &mut self.filters {
            filter.reset();
        }
    }

    fn state(&self) -> FilterState {
        self.core.state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_filter_echoes_and_requires_reset() {
        let mut f = NullFilter::new();
        assert_eq!(f.write(b'x').unwrap(), FilterState::Pass);
        assert_eq!(f.read().unwrap(), vec![b'x']);
        assert_eq!(f.write(b'y'), Err(FilterError::MustReset));
        f.reset();
        assert_eq!(f.state(), FilterState::Empty);
    }

    #[test]
    fn empty_read_and_waiting_read_are_rejected() {
        let mut f = NullFilter::new();
        assert_eq!(f.read(), Err(FilterError::EmptyRead));
    }

    #[test]
    fn serial_group_chains_null_filters() {
        let mut group = SerialFilterGroup::new(vec![Box::new(NullFilter::new()), Box::new(NullFilter::new())]);
        assert_eq!(group.write(b'a').unwrap(), FilterState::Pass);
        assert_eq!(group.read().unwrap(), vec![b'a']);
    }

    #[test]
    fn serial_group_propagates_write_errors() {
        let mut group = SerialFilterGroup::new(vec![Box::new(NullFilter::new())]);
        group.write(b'a').unwrap();
        assert_eq!(group.write(b'b'), Err(FilterError::MustReset));
    }
}
