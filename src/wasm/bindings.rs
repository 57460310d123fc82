//! JavaScript bindings for Cotext core types

use super::utils::js_error;
use crate::config::SessionConfig;
use crate::crdt::text::{Operation, TextReplica};
use crate::protocol::{decode_frame, encode_batch, encode_caret, InboundMessage};
use crate::sync::{ConnectionState, EditorSurface, SurfaceError, SyncSession};
use serde::Serialize;
use wasm_bindgen::prelude::*;

/// JavaScript-friendly wrapper for a bare text replica
#[wasm_bindgen]
pub struct WasmReplica {
    inner: TextReplica,
}

#[wasm_bindgen]
impl WasmReplica {
    /// Create an empty replica for the given site
    #[wasm_bindgen(constructor)]
    pub fn new(site_id: String) -> Self {
        Self {
            inner: TextReplica::new(site_id),
        }
    }

    /// Diff against the current text; returns the operations as a JSON array
    #[wasm_bindgen(js_name = localEdit)]
    pub fn local_edit(&mut self, next: String) -> Result<String, JsValue> {
        let ops = self.inner.local_edit(&next);
        encode_batch(&ops).map_err(|e| js_error("Serialization failed", e))
    }

    /// Apply one operation (pass JSON string); returns whether it changed anything
    #[wasm_bindgen(js_name = apply)]
    pub fn apply(&mut self, op_json: String) -> Result<bool, JsValue> {
        let op: Operation =
            serde_json::from_str(&op_json).map_err(|e| js_error("Invalid operation JSON", e))?;
        Ok(self.inner.apply(&op).changed())
    }

    /// Get the visible text
    #[wasm_bindgen(js_name = text)]
    pub fn text(&self) -> String {
        self.inner.text().to_string()
    }

    /// Visible offset of a character, or undefined for tombstones
    #[wasm_bindgen(js_name = relativeIndex)]
    pub fn relative_index(&self, char_id: String) -> Option<usize> {
        self.inner.relative_index(&char_id)
    }

    /// Export every character, tombstones included, as JSON
    #[wasm_bindgen(js_name = toJSON)]
    pub fn to_json(&self) -> Result<String, JsValue> {
        serde_json::to_string(self.inner.store()).map_err(|e| js_error("Serialization failed", e))
    }
}

/// A splice for the browser to apply to its editor
///
/// Offsets and lengths are UTF-16 code units, the unit of JavaScript
/// string indices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum Splice {
    Insert { offset: usize, value: String },
    Delete { offset: usize, length: usize },
    Replace { text: String },
}

/// Surface that records splices instead of rendering them
///
/// Keeps the UTF-16 width of every character the browser shows so that
/// character offsets can be translated.
#[derive(Debug, Default)]
struct RecordingSurface {
    widths: Vec<usize>,
    splices: Vec<Splice>,
}

impl RecordingSurface {
    fn showing(characters: &[&str]) -> Self {
        Self {
            widths: characters.iter().map(|c| utf16_len(c)).collect(),
            splices: Vec::new(),
        }
    }

    fn utf16_offset(&self, offset: usize) -> usize {
        self.widths[..offset].iter().sum()
    }
}

fn utf16_len(value: &str) -> usize {
    value.encode_utf16().count()
}

impl EditorSurface for RecordingSurface {
    fn insert(&mut self, offset: usize, value: &str) -> Result<(), SurfaceError> {
        let length = self.widths.len();
        if offset > length {
            return Err(SurfaceError::OffsetOutOfBounds { offset, length });
        }
        self.splices.push(Splice::Insert {
            offset: self.utf16_offset(offset),
            value: value.to_string(),
        });
        self.widths.insert(offset, utf16_len(value));
        Ok(())
    }

    fn delete(&mut self, offset: usize) -> Result<(), SurfaceError> {
        if offset >= self.widths.len() {
            return Err(SurfaceError::OffsetOutOfBounds {
                offset,
                length: self.widths.len(),
            });
        }
        let at = self.utf16_offset(offset);
        let length = self.widths.remove(offset);
        self.splices.push(Splice::Delete { offset: at, length });
        Ok(())
    }

    fn replace_all(&mut self, characters: &[&str]) {
        self.widths = characters.iter().map(|c| utf16_len(c)).collect();
        self.splices.push(Splice::Replace {
            text: characters.concat(),
        });
    }

    // The browser owns the buffer
    fn text(&self) -> String {
        String::new()
    }
}

/// JavaScript-friendly wrapper for a sync session
///
/// The page owns the websocket and the timers. It reports connection state
/// changes, feeds received frames to `receive`, and sends whatever
/// `takeBatch` and `takeCaretFrame` return.
#[wasm_bindgen]
pub struct WasmSession {
    inner: SyncSession,
}

#[wasm_bindgen]
impl WasmSession {
    /// Create a session (optionally pass configuration JSON)
    #[wasm_bindgen(constructor)]
    pub fn new(
        document_id: String,
        site_id: String,
        config_json: Option<String>,
    ) -> Result<WasmSession, JsValue> {
        let config = match config_json {
            Some(json) => SessionConfig::from_json(&json).map_err(|e| js_error("Invalid config", e))?,
            None => SessionConfig::default(),
        };
        Ok(Self {
            inner: SyncSession::new(document_id, site_id, &config),
        })
    }

    /// Report a connection state: "connecting", "open", "closing" or "closed"
    #[wasm_bindgen(js_name = setState)]
    pub fn set_state(&mut self, state: String) -> Result<(), JsValue> {
        let next: ConnectionState = serde_json::from_value(serde_json::Value::String(state))
            .map_err(|e| js_error("Unknown connection state", e))?;
        self.inner
            .transition(next)
            .map_err(|e| js_error("Transition rejected", e))
    }

    /// Current connection state
    #[wasm_bindgen(js_name = state)]
    pub fn state(&self) -> String {
        self.inner.state().to_string()
    }

    /// Report the full editor text after a local edit
    #[wasm_bindgen(js_name = localEdit)]
    pub fn local_edit(&mut self, next: String) -> usize {
        self.inner.local_edit(&next)
    }

    /// Outgoing batch frame, only while open and non-empty
    #[wasm_bindgen(js_name = takeBatch)]
    pub fn take_batch(&mut self) -> Result<Option<String>, JsValue> {
        match self.inner.take_batch() {
            Some(batch) => encode_batch(&batch)
                .map(Some)
                .map_err(|e| js_error("Serialization failed", e)),
            None => Ok(None),
        }
    }

    /// Handle a received frame; returns the splices to apply as JSON
    ///
    /// Each splice is `{kind: "insert", offset, value}`,
    /// `{kind: "delete", offset, length}` or `{kind: "replace", text}`, with
    /// offsets and lengths in UTF-16 code units. Malformed frames are
    /// dropped and yield an empty list.
    #[wasm_bindgen(js_name = receive)]
    pub fn receive(&mut self, frame: String) -> Result<String, JsValue> {
        let mut surface = RecordingSurface::showing(&self.inner.characters());
        match decode_frame(&frame) {
            Ok(message @ (InboundMessage::Batch(_) | InboundMessage::Operation(_))) => {
                self.inner.handle_message(message, &mut surface);
            }
            Ok(presence) => {
                self.inner.handle_presence(presence);
            }
            Err(e) => tracing::warn!(error = %e, "Dropping malformed frame"),
        }
        serde_json::to_string(&surface.splices).map_err(|e| js_error("Serialization failed", e))
    }

    /// Record the local caret offset
    ///
    /// Caret offsets, here and in `participants`, count characters of the
    /// replica (see `characterCount`), not UTF-16 code units.
    #[wasm_bindgen(js_name = setCaret)]
    pub fn set_caret(&mut self, offset: usize) {
        self.inner.set_local_caret(offset);
    }

    /// Caret frame to send, if the caret moved and the connection is open
    #[wasm_bindgen(js_name = takeCaretFrame)]
    pub fn take_caret_frame(&mut self) -> Result<Option<String>, JsValue> {
        match self.inner.take_caret_update() {
            Some(offset) => encode_caret(self.inner.site_id(), offset)
                .map(Some)
                .map_err(|e| js_error("Serialization failed", e)),
            None => Ok(None),
        }
    }

    /// Active participants as an array of `{userId, color, caret}` objects
    #[wasm_bindgen(js_name = participants)]
    pub fn participants(&self) -> Result<JsValue, JsValue> {
        let json = serde_json::to_string(&self.inner.participants())
            .map_err(|e| js_error("Serialization failed", e))?;
        js_sys::JSON::parse(&json)
    }

    /// Visible text, for a full resync of the editor
    #[wasm_bindgen(js_name = text)]
    pub fn text(&self) -> String {
        self.inner.text().to_string()
    }

    /// Number of characters the replica shows
    #[wasm_bindgen(js_name = characterCount)]
    pub fn character_count(&self) -> usize {
        self.inner.characters().len()
    }
}
