//! Incremental decoding of a top-level JSON array.
//!
//! The bulk submission read returns one large array. Elements are handed
//! downstream as soon as their closing byte arrives, so submission can start
//! long before the response completes.

use futures::stream::{self, Stream, StreamExt};
use std::collections::VecDeque;
use std::pin::Pin;

use crate::connectors::{Record, RecordStream};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    BeforeArray,
    InArray,
    Done,
    Failed,
}

/// Position between top-level elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    First,
    AfterComma,
    AfterElement,
}

/// Splits a byte stream holding `[ {...}, {...} ]` into records.
#[derive(Debug)]
pub struct JsonArrayDecoder {
    state: State,
    slot: Slot,
    depth: usize,
    in_string: bool,
    escaped: bool,
    element: Vec<u8>,
}

impl Default for JsonArrayDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl JsonArrayDecoder {
    /// Creates a decoder positioned before the opening bracket.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: State::BeforeArray,
            slot: Slot::First,
            depth: 0,
            in_string: false,
            escaped: false,
            element: Vec::new(),
        }
    }

    /// Feeds the next chunk, pushing every record it completes onto `out`.
    ///
    /// Records completed before an error stay in `out`. Once an error has
    /// been returned every later call fails too.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not an array of objects.
    pub fn feed(&mut self, chunk: &[u8], out: &mut Vec<Record>) -> Result<()> {
        let result = self.feed_bytes(chunk, out);
        if result.is_err() {
            self.state = State::Failed;
        }
        result
    }

    /// Checks that the array was closed.
    ///
    /// # Errors
    ///
    /// Returns an error if the input ended early or decoding already failed.
    pub fn finish(&self) -> Result<()> {
        match self.state {
            State::Done => Ok(()),
            State::BeforeArray => Err(Error::SourceStream(
                "response ended before a JSON array started".to_string(),
            )),
            State::InArray => Err(Error::SourceStream(
                "response ended inside the JSON array".to_string(),
            )),
            State::Failed => Err(failed()),
        }
    }

    fn feed_bytes(&mut self, chunk: &[u8], out: &mut Vec<Record>) -> Result<()> {
        for &byte in chunk {
            match self.state {
                State::BeforeArray => match byte {
                    b'[' => self.state = State::InArray,
                    // UTF-8 byte order mark
                    0xEF | 0xBB | 0xBF => {}
                    b if b.is_ascii_whitespace() => {}
                    other => {
                        return Err(Error::SourceStream(format!(
                            "expected a JSON array, found '{}'",
                            char::from(other)
                        )))
                    }
                },
                State::InArray => self.step(byte, out)?,
                State::Done => {
                    if !byte.is_ascii_whitespace() {
                        return Err(Error::SourceStream(
                            "unexpected data after the end of the JSON array".to_string(),
                        ));
                    }
                }
                State::Failed => return Err(failed()),
            }
        }

        Ok(())
    }

    fn step(&mut self, byte: u8, out: &mut Vec<Record>) -> Result<()> {
        if self.in_string {
            self.element.push(byte);
            if self.escaped {
                self.escaped = false;
            } else if byte == b'\\' {
                self.escaped = true;
            } else if byte == b'"' {
                self.in_string = false;
            }
            return Ok(());
        }

        let starts_element = self.depth == 0
            && self.element.is_empty()
            && !matches!(byte, b',' | b']')
            && !byte.is_ascii_whitespace();
        if starts_element && self.slot == Slot::AfterElement {
            return Err(Error::SourceStream(
                "missing ',' between JSON array elements".to_string(),
            ));
        }

        match byte {
            b'"' => {
                self.in_string = true;
                self.element.push(byte);
            }
            b'{' | b'[' => {
                self.depth += 1;
                self.element.push(byte);
            }
            b'}' | b']' if self.depth > 0 => {
                self.depth -= 1;
                self.element.push(byte);
                if self.depth == 0 {
                    out.push(self.take_element()?);
                }
            }
            b',' if self.depth == 0 => {
                if !self.element.is_empty() {
                    out.push(self.take_element()?);
                }
                if self.slot != Slot::AfterElement {
                    return Err(Error::SourceStream(
                        "unexpected ',' in JSON array".to_string(),
                    ));
                }
                self.slot = Slot::AfterComma;
            }
            b']' => {
                if !self.element.is_empty() {
                    out.push(self.take_element()?);
                }
                if self.slot == Slot::AfterComma {
                    return Err(Error::SourceStream(
                        "trailing ',' in JSON array".to_string(),
                    ));
                }
                self.state = State::Done;
            }
            b if b.is_ascii_whitespace() && self.element.is_empty() => {}
            _ => self.element.push(byte),
        }
        Ok(())
    }

    fn take_element(&mut self) -> Result<Record> {
        let bytes = std::mem::take(&mut self.element);
        self.slot = Slot::AfterElement;
        match serde_json::from_slice(&bytes)? {
            serde_json::Value::Object(record) => Ok(record),
            other => Err(Error::SourceStream(format!(
                "expected a JSON object in the array, found {other}"
            ))),
        }
    }
}

fn failed() -> Error {
    Error::SourceStream("JSON array decoding already failed".to_string())
}

struct DecodeState<S> {
    bytes: Pin<Box<S>>,
    decoder: JsonArrayDecoder,
    pending: VecDeque<Record>,
    error: Option<Error>,
    done: bool,
}

/// Decodes records lazily from a byte stream holding a JSON array.
///
/// Records completed before a decoding error are still yielded, then the
/// error, then the stream ends.
pub fn decode_records<S, B, E>(bytes: S) -> RecordStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<Error> + Send + 'static,
{
    let state = DecodeState {
        bytes: Box::pin(bytes),
        decoder: JsonArrayDecoder::new(),
        pending: VecDeque::new(),
        error: None,
        done: false,
    };

    stream::unfold(state, |mut st| async move {
        loop {
            if let Some(record) = st.pending.pop_front() {
                return Some((Ok(record), st));
            }
            if let Some(e) = st.error.take() {
                return Some((Err(e), st));
            }
            if st.done {
                return None;
            }
            match st.bytes.next().await {
                Some(Ok(chunk)) => {
                    let mut records = Vec::new();
                    let fed = st.decoder.feed(chunk.as_ref(), &mut records);
                    st.pending.extend(records);
                    if let Err(e) = fed {
                        st.error = Some(e);
                        st.done = true;
                    }
                }
                Some(Err(e)) => {
                    st.error = Some(e.into());
                    st.done = true;
                }
                None => {
                    st.done = true;
                    st.error = st.decoder.finish().err();
                }
            }
        }
    })
    .boxed()
}

#[cfg(test)]
#[path = "json_stream_tests.rs"]
mod tests;
