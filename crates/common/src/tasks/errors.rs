// Copyright (C) 2025 Ryan Daum <ryan.daum@gmail.com> This program is free
// software: you can redistribute it and/or modify it under the terms of the GNU
// General Public License as published by the Free Software Foundation, version
// 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

use protocosm_var::{Error, Obj};
use std::fmt::{Display, Formatter};

/// A method activation an exception passed through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub obj: Obj,
    pub method: String,
    pub line: Option<usize>,
}

impl Display for Frame {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}:{} (line {line})", self.obj, self.method),
            None => write!(f, "{}:{}", self.obj, self.method),
        }
    }
}

/// An error raised in method code that no `except` arm caught. The backtrace runs from the frame
/// that raised it outwards; its first entry is the originating object.
#[derive(Debug, Clone, PartialEq)]
pub struct Exception {
    pub error: Error,
    pub backtrace: Vec<Frame>,
}

impl Exception {
    pub fn new(error: Error) -> Self {
        Self {
            error,
            backtrace: vec![],
        }
    }

    pub fn origin(&self) -> Option<&Frame> {
        self.backtrace.first()
    }

    pub fn push_frame(&mut self, obj: Obj, method: &str, line: Option<usize>) {
        self.backtrace.push(Frame {
            obj,
            method: method.to_string(),
            line,
        });
    }
}

impl Display for Exception {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.error)?;
        if let Some(origin) = self.origin() {
            write!(f, " raised in {origin}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocosm_var::E_PROPNF;

    #[test]
    fn test_origin_is_innermost_frame() {
        let mut e = Exception::new(E_PROPNF.msg("no such property"));
        e.push_frame(Obj::mk_id(7), "inner", Some(2));
        e.push_frame(Obj::mk_id(5), "outer", Some(10));
        assert_eq!(e.origin().unwrap().obj, Obj::mk_id(7));
        assert_eq!(
            e.to_string(),
            "E_PROPNF (no such property) raised in #7:inner (line 2)"
        );
    }
}
