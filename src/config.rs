/*
 * config.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Busta, a streaming MIME tokenizer.
 *
 * Busta is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Busta is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Busta.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Parse configuration: limits, recursion mode, strictness, decode monitor.

use tracing::warn;

use crate::error::MimeError;

/// How nested multipart and message bodies are walked versus surfaced opaquely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecursionMode {
    /// Tokenize message/rfc822 bodies as nested entities (the default).
    #[default]
    Recurse,
    /// Surface message/rfc822 bodies as opaque bodies.
    NoRecurse,
    /// Surface multipart containers as a single opaque body instead of walking them.
    Flat,
    /// Surface each entity, headers included, once as raw bytes.
    Raw,
}

/// Policy for malformed-input events: continue (optionally logging) or fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecodeMonitor {
    /// Escalate every malformed-input event to a hard parse failure.
    Strict,
    /// Tolerate and log at warn level.
    #[default]
    Lenient,
    /// Tolerate without logging.
    Silent,
}

impl DecodeMonitor {
    /// Report one malformed-input event. Strict returns the error; the
    /// lenient variants return Ok.
    pub fn report(&self, what: &'static str, detail: impl Into<String>) -> Result<(), MimeError> {
        match self {
            DecodeMonitor::Strict => Err(MimeError::Decode {
                what,
                detail: detail.into(),
            }),
            DecodeMonitor::Lenient => {
                let detail = detail.into();
                warn!(what, %detail, "tolerating malformed input");
                Ok(())
            }
            DecodeMonitor::Silent => Ok(()),
        }
    }

    /// True when this monitor fails the parse on malformed input.
    pub fn is_strict(&self) -> bool {
        matches!(self, DecodeMonitor::Strict)
    }
}

/// Tokenizer configuration. One value per parse; the defaults suit
/// well-formed mail and tolerate the usual real-world damage.
#[derive(Debug, Clone)]
pub struct MimeConfig {
    /// Maximum length of one physical header line, terminator included.
    pub max_line_len: usize,
    /// Maximum number of fields in one header section.
    pub max_header_count: usize,
    /// Maximum total size in bytes of one header section.
    pub max_header_len: usize,
    /// Maximum entity nesting depth.
    pub max_depth: usize,
    /// How nested entities are walked.
    pub recursion_mode: RecursionMode,
    /// When set, the input is taken to have no header section at all and this
    /// value is queued as a synthetic Content-Type field. The message and
    /// header envelope events are still emitted around the synthetic field,
    /// so the event sequence keeps the shape of a normal parse.
    pub headless_content_type: Option<String>,
    /// Strict mode fails on structural damage that lenient mode degrades over.
    pub strict: bool,
    /// Charset assumed for encoded words declaring an unknown charset.
    pub fallback_charset: Option<String>,
}

impl Default for MimeConfig {
    fn default() -> Self {
        Self {
            max_line_len: 1000,
            max_header_count: 1000,
            max_header_len: 10000,
            max_depth: 10,
            recursion_mode: RecursionMode::Recurse,
            headless_content_type: None,
            strict: false,
            fallback_charset: None,
        }
    }
}

impl MimeConfig {
    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Self::default()
        }
    }

    pub fn with_recursion_mode(mut self, mode: RecursionMode) -> Self {
        self.recursion_mode = mode;
        self
    }

    pub fn with_headless_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.headless_content_type = Some(content_type.into());
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_fallback_charset(mut self, charset: impl Into<String>) -> Self {
        self.fallback_charset = Some(charset.into());
        self
    }

    /// The decode monitor implied by the strictness flag.
    pub fn monitor(&self) -> DecodeMonitor {
        if self.strict {
            DecodeMonitor::Strict
        } else {
            DecodeMonitor::Lenient
        }
    }
}
