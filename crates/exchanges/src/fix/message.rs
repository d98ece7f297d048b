//! FIX message codec

use crate::errors::{ExchangeError, Result};
use crate::fix::tags::{msg_type, tag, SOH};
use keeper_core::timing::fix_utc_timestamp;
use keeper_core::Wad;
use memchr::memchr;
use std::fmt;
use std::str::FromStr;

/// Standard header tags other than 8, 9 and 35.
fn is_header_tag(t: u32) -> bool {
    matches!(t, 34 | 43 | 49 | 50 | 52 | 56 | 57 | 97 | 115 | 122 | 128 | 142 | 143 | 369 | 1128)
}

/// A FIX message as ordered `(tag, value)` fields.
///
/// Fields are kept in a list rather than a map so that repeating groups
/// survive decoding; use [`FixMessage::get_nth`] to walk a group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixMessage {
    begin_string: String,
    msg_type: String,
    header: Vec<(u32, String)>,
    body: Vec<(u32, String)>,
}

impl FixMessage {
    pub fn new(begin_string: impl Into<String>, msg_type: impl Into<String>) -> Self {
        Self {
            begin_string: begin_string.into(),
            msg_type: msg_type.into(),
            header: Vec::with_capacity(6),
            body: Vec::with_capacity(16),
        }
    }

    pub fn begin_string(&self) -> &str {
        &self.begin_string
    }

    pub fn msg_type(&self) -> &str {
        &self.msg_type
    }

    /// MsgSeqNum (34), if present and numeric
    pub fn seq_num(&self) -> Option<u64> {
        self.get_parsed(tag::MSG_SEQ_NUM)
    }

    pub fn is_session_message(&self) -> bool {
        msg_type::is_session(&self.msg_type)
    }

    /// Append a body field. BeginString, BodyLength, MsgType and CheckSum
    /// are owned by the codec and ignored here.
    pub fn append_pair(&mut self, t: u32, value: impl ToString) -> &mut Self {
        if !Self::is_framing_tag(t) {
            self.body.push((t, value.to_string()));
        }
        self
    }

    pub fn append_header(&mut self, t: u32, value: impl ToString) -> &mut Self {
        if !Self::is_framing_tag(t) {
            self.header.push((t, value.to_string()));
        }
        self
    }

    /// Append the current UTC time as a body field.
    pub fn append_utc_timestamp(&mut self, t: u32) -> &mut Self {
        self.append_pair(t, fix_utc_timestamp(chrono::Utc::now()))
    }

    pub fn append_utc_timestamp_header(&mut self, t: u32) -> &mut Self {
        self.append_header(t, fix_utc_timestamp(chrono::Utc::now()))
    }

    /// Replace the first header occurrence of `t`, or append it.
    pub fn set_header(&mut self, t: u32, value: impl ToString) -> &mut Self {
        match self.header.iter_mut().find(|(existing, _)| *existing == t) {
            Some(field) => field.1 = value.to_string(),
            None => {
                self.append_header(t, value);
            }
        }
        self
    }

    /// Drop every occurrence of `t` from header and body.
    pub fn remove(&mut self, t: u32) {
        self.header.retain(|(existing, _)| *existing != t);
        self.body.retain(|(existing, _)| *existing != t);
    }

    fn is_framing_tag(t: u32) -> bool {
        matches!(t, tag::BEGIN_STRING | tag::BODY_LENGTH | tag::MSG_TYPE | tag::CHECKSUM)
    }

    /// Header fields followed by body fields, excluding 8/9/35/10.
    pub fn fields(&self) -> impl Iterator<Item = (u32, &str)> {
        self.header
            .iter()
            .chain(self.body.iter())
            .map(|(t, v)| (*t, v.as_str()))
    }

    /// First occurrence of `t`
    pub fn get(&self, t: u32) -> Option<&str> {
        self.get_nth(t, 1)
    }

    /// `n`th occurrence of `t`, counting from 1.
    pub fn get_nth(&self, t: u32, n: usize) -> Option<&str> {
        if n == 0 {
            return None;
        }
        match t {
            tag::BEGIN_STRING if n == 1 => Some(self.begin_string.as_str()),
            tag::MSG_TYPE if n == 1 => Some(self.msg_type.as_str()),
            _ => self
                .fields()
                .filter(|(existing, _)| *existing == t)
                .nth(n - 1)
                .map(|(_, v)| v),
        }
    }

    pub fn count(&self, t: u32) -> usize {
        self.fields().filter(|(existing, _)| *existing == t).count()
    }

    pub fn get_parsed<T: FromStr>(&self, t: u32) -> Option<T> {
        self.get(t).and_then(|v| v.parse().ok())
    }

    /// Value of `t`, or `MissingField`.
    pub fn require(&self, t: u32) -> Result<&str> {
        self.require_nth(t, 1)
    }

    pub fn require_nth(&self, t: u32, n: usize) -> Result<&str> {
        self.get_nth(t, n).ok_or_else(|| ExchangeError::MissingField {
            tag: t,
            msg_type: self.msg_type.clone(),
        })
    }

    pub fn require_wad_nth(&self, t: u32, n: usize) -> Result<Wad> {
        Ok(Wad::from_str_exact(self.require_nth(t, n)?)?)
    }

    /// Entries of the repeating group counted by `count_tag`, each starting
    /// at `delimiter`. At most `count` entries are returned.
    pub fn group(&self, count_tag: u32, delimiter: u32) -> Vec<GroupEntry<'_>> {
        let count = self.get_parsed::<usize>(count_tag).unwrap_or(0);
        let mut entries: Vec<GroupEntry<'_>> = Vec::with_capacity(count);
        let mut in_group = false;
        for (t, v) in self.fields() {
            if t == count_tag && !in_group {
                in_group = true;
                continue;
            }
            if !in_group {
                continue;
            }
            if t == delimiter {
                if entries.len() == count {
                    break;
                }
                entries.push(GroupEntry::default());
            }
            if let Some(entry) = entries.last_mut() {
                entry.fields.push((t, v));
            }
        }
        entries
    }

    /// Like [`group`](Self::group), delimited by whichever tag follows
    /// `count_tag`. MDIncGrp entries open with 279, MDFullGrp with 269.
    pub fn group_from(&self, count_tag: u32) -> Vec<GroupEntry<'_>> {
        let delimiter = self
            .fields()
            .skip_while(|(t, _)| *t != count_tag)
            .nth(1)
            .map(|(t, _)| t);
        match delimiter {
            Some(delimiter) => self.group(count_tag, delimiter),
            None => Vec::new(),
        }
    }

    /// Serialize with computed BodyLength and CheckSum.
    pub fn encode(&self) -> Vec<u8> {
        let mut body = Vec::with_capacity(256);
        push_field(&mut body, tag::MSG_TYPE, &self.msg_type);
        for (t, v) in self.header.iter().chain(self.body.iter()) {
            push_field(&mut body, *t, v);
        }

        let mut buffer = Vec::with_capacity(body.len() + 32);
        push_field(&mut buffer, tag::BEGIN_STRING, &self.begin_string);
        push_field(&mut buffer, tag::BODY_LENGTH, &body.len().to_string());
        buffer.extend_from_slice(&body);

        let sum = checksum(&buffer);
        push_field(&mut buffer, tag::CHECKSUM, &format!("{sum:03}"));
        buffer
    }

    /// Parse exactly one complete message.
    pub fn decode(raw: &[u8]) -> Result<Self> {
        if raw.last() != Some(&SOH) {
            return Err(malformed("message does not end with SOH"));
        }

        let mut fields: Vec<(u32, &str, usize)> = Vec::with_capacity(32);
        let mut pos = 0;
        while pos < raw.len() {
            let end = memchr(SOH, &raw[pos..])
                .map(|i| pos + i)
                .ok_or_else(|| malformed("unterminated field"))?;
            let field = &raw[pos..end];
            let eq = memchr(b'=', field).ok_or_else(|| malformed("field without '='"))?;
            let t = std::str::from_utf8(&field[..eq])
                .ok()
                .and_then(|s| s.parse::<u32>().ok())
                .ok_or_else(|| malformed("non-numeric tag"))?;
            let value = std::str::from_utf8(&field[eq + 1..])
                .map_err(|_| malformed(&format!("tag {t} is not valid UTF-8")))?;
            fields.push((t, value, pos));
            pos = end + 1;
        }

        if fields.len() < 4 {
            return Err(malformed("too few fields"));
        }
        let expected_order = [tag::BEGIN_STRING, tag::BODY_LENGTH, tag::MSG_TYPE];
        for (i, expected) in expected_order.iter().enumerate() {
            if fields[i].0 != *expected {
                return Err(malformed(&format!("field {} must be tag {expected}, got {}", i + 1, fields[i].0)));
            }
        }
        let (last_tag, last_value, checksum_start) = fields[fields.len() - 1];
        if last_tag != tag::CHECKSUM {
            return Err(malformed("last field must be CheckSum (10)"));
        }

        let declared: usize = fields[1]
            .1
            .parse()
            .map_err(|_| malformed("BodyLength is not a number"))?;
        let body_start = fields[2].2;
        if checksum_start - body_start != declared {
            return Err(malformed(&format!(
                "BodyLength {declared} does not match actual {}",
                checksum_start - body_start
            )));
        }

        let expected: u32 = last_value
            .parse()
            .map_err(|_| malformed("CheckSum is not a number"))?;
        let computed = checksum(&raw[..checksum_start]);
        if expected != computed {
            return Err(ExchangeError::ChecksumMismatch { expected, computed });
        }

        let mut message = FixMessage::new(fields[0].1, fields[2].1);
        for (t, value, _) in &fields[3..fields.len() - 1] {
            if is_header_tag(*t) {
                message.header.push((*t, value.to_string()));
            } else {
                message.body.push((*t, value.to_string()));
            }
        }
        Ok(message)
    }
}

/// One entry of a repeating group
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupEntry<'a> {
    fields: Vec<(u32, &'a str)>,
}

impl<'a> GroupEntry<'a> {
    pub fn get(&self, t: u32) -> Option<&'a str> {
        self.fields.iter().find(|(existing, _)| *existing == t).map(|(_, v)| *v)
    }

    pub fn require(&self, t: u32, msg_type: &str) -> Result<&'a str> {
        self.get(t).ok_or_else(|| ExchangeError::MissingField {
            tag: t,
            msg_type: msg_type.to_string(),
        })
    }

    /// Optional decimal field; present but unparsable is an error.
    pub fn wad(&self, t: u32) -> Result<Option<Wad>> {
        self.get(t).map(Wad::from_str_exact).transpose().map_err(Into::into)
    }
}

fn push_field(buf: &mut Vec<u8>, t: u32, value: &str) {
    buf.extend_from_slice(t.to_string().as_bytes());
    buf.push(b'=');
    buf.extend_from_slice(value.as_bytes());
    buf.push(SOH);
}

/// Byte sum modulo 256
pub fn checksum(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0u32, |acc, &b| acc.wrapping_add(b as u32)) % 256
}

fn malformed(reason: &str) -> ExchangeError {
    ExchangeError::MalformedMessage(reason.to_string())
}

impl fmt::Display for FixMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&keeper_core::logging::fix_printable(&self.encode()))
    }
}
