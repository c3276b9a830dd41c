//! Interactive-input prompt detection.
//!
//! The interpreter prints a fixed sentinel when it blocks on `input` or
//! `input_int`. Detection is plain substring matching on decoded output;
//! the marker is never stripped, so the prompt stays visible to the user.
//!
//! | Marker        | Kind                   |
//! |---------------|------------------------|
//! | `input> `     | [`PromptKind::Text`]   |
//! | `input_int> ` | [`PromptKind::Numeric`]|

/// What sort of value the interpreter is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptKind {
    /// Free-form text line.
    Text,
    /// Integer value.
    Numeric,
}

/// A sentinel substring and the prompt kind it signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptMarker {
    /// Literal text emitted by the interpreter.
    pub sentinel: &'static str,
    /// Kind of input requested.
    pub kind: PromptKind,
}

/// Every marker the interpreter is known to emit.
pub const PROMPT_MARKERS: &[PromptMarker] = &[
    PromptMarker {
        sentinel: "input> ",
        kind: PromptKind::Text,
    },
    PromptMarker {
        sentinel: "input_int> ",
        kind: PromptKind::Numeric,
    },
];

/// Whether `chunk` contains any input marker.
#[must_use]
pub fn detect(chunk: &str) -> bool {
    classify(chunk).is_some()
}

/// Kind of the first marker in table order found in `chunk`.
#[must_use]
pub fn classify(chunk: &str) -> Option<PromptKind> {
    PROMPT_MARKERS
        .iter()
        .find(|marker| chunk.contains(marker.sentinel))
        .map(|marker| marker.kind)
}

fn longest_marker_len() -> usize {
    PROMPT_MARKERS
        .iter()
        .map(|marker| marker.sentinel.len())
        .max()
        .unwrap_or(0)
}

/// Stream-aware detector that also catches markers split across two
/// consecutive chunks.
///
/// Keeps the last `longest_marker - 1` bytes of the previous chunk. A marker
/// is reported only when its match ends inside the newest chunk, so a marker
/// seen once is never reported again.
#[derive(Debug, Default)]
pub struct PromptScanner {
    tail: String,
}

impl PromptScanner {
    /// Create a scanner with an empty carry-over.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next decoded chunk; returns the kind of a newly completed
    /// marker, if any.
    pub fn scan(&mut self, chunk: &str) -> Option<PromptKind> {
        let carried = self.tail.len();
        let mut window = std::mem::take(&mut self.tail);
        window.push_str(chunk);

        let found = PROMPT_MARKERS
            .iter()
            .filter_map(|marker| {
                window
                    .match_indices(marker.sentinel)
                    .map(|(start, text)| start + text.len())
                    .filter(|&end| end > carried)
                    .max()
                    .map(|end| (end, marker.kind))
            })
            .max_by_key(|&(end, _)| end)
            .map(|(_, kind)| kind);

        self.tail = keep_tail(&window, longest_marker_len().saturating_sub(1));
        found
    }

    /// Forget any carried-over text.
    pub fn reset(&mut self) {
        self.tail.clear();
    }
}

/// Last `max` bytes of `text`, widened to the nearest char boundary.
fn keep_tail(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_owned();
    }
    let mut start = text.len() - max;
    while !text.is_char_boundary(start) {
        start -= 1;
    }
    text[start..].to_owned()
}
