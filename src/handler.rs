/*
 * handler.rs
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

//! MIME handler trait: receives tokenizer events (push model).

use crate::descriptor::BodyDescriptor;
use crate::error::MimeError;
use crate::field::RawField;

/// Handler for tokenizer events (push model). The stream parser calls these
/// as it reads; an error return aborts dispatch. Byte-stream payloads arrive
/// as chunk calls between the corresponding notifications.
///
/// Every `start_*` call is matched by its `end_*` call, including when the
/// parse is cancelled through a stop handle.
pub trait MimeHandler {
    fn start_message(&mut self) -> Result<(), MimeError> {
        Ok(())
    }

    fn start_header(&mut self) -> Result<(), MimeError> {
        Ok(())
    }

    fn field(&mut self, _field: &RawField) -> Result<(), MimeError> {
        Ok(())
    }

    fn end_header(&mut self) -> Result<(), MimeError> {
        Ok(())
    }

    fn preamble_chunk(&mut self, _data: &[u8]) -> Result<(), MimeError> {
        Ok(())
    }

    fn start_multipart(&mut self, _descriptor: &BodyDescriptor) -> Result<(), MimeError> {
        Ok(())
    }

    fn start_body_part(&mut self) -> Result<(), MimeError> {
        Ok(())
    }

    fn end_body_part(&mut self) -> Result<(), MimeError> {
        Ok(())
    }

    fn epilogue_chunk(&mut self, _data: &[u8]) -> Result<(), MimeError> {
        Ok(())
    }

    fn end_multipart(&mut self) -> Result<(), MimeError> {
        Ok(())
    }

    /// A discrete body begins; its bytes follow as `body_chunk` calls.
    fn body(&mut self, _descriptor: &BodyDescriptor) -> Result<(), MimeError> {
        Ok(())
    }

    fn body_chunk(&mut self, _data: &[u8]) -> Result<(), MimeError> {
        Ok(())
    }

    /// Raw-mode entity bytes, headers included.
    fn raw_chunk(&mut self, _data: &[u8]) -> Result<(), MimeError> {
        Ok(())
    }

    fn end_message(&mut self) -> Result<(), MimeError> {
        Ok(())
    }

    fn end_of_stream(&mut self) -> Result<(), MimeError> {
        Ok(())
    }
}
