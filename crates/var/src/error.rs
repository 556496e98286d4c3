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

use crate::var::{Var, v_map_iter, v_none, v_str};
use ErrorCode::*;
use std::fmt::{Debug, Display, Formatter};
use strum::{EnumString, IntoStaticStr};

/// A runtime error: the code method source matches on in `except` arms, an optional human
/// readable message, and an optional payload value.
#[derive(Clone, PartialEq)]
pub struct Error {
    pub err_type: ErrorCode,
    pub msg: Option<String>,
    pub value: Option<Box<Var>>,
}

impl Error {
    pub fn new(err_type: ErrorCode, msg: Option<String>, value: Option<Var>) -> Self {
        Self {
            err_type,
            msg,
            value: value.map(Box::new),
        }
    }

    pub fn message(&self) -> String {
        match &self.msg {
            Some(msg) => msg.clone(),
            None => self.err_type.to_string(),
        }
    }

    /// The value bound to the variable of an `except` arm.
    pub fn to_var(&self) -> Var {
        let value = self.value.as_deref().cloned().unwrap_or_else(v_none);
        v_map_iter([
            ("code".to_string(), v_str(&self.err_type.to_string())),
            ("message".to_string(), v_str(&self.message())),
            ("value".to_string(), value),
        ])
    }

    /// The inverse of `to_var`, for re-raising a caught error value.
    pub fn from_var(v: &Var) -> Option<Self> {
        let map = v.as_map()?;
        let code = map.get("code")?.as_str()?;
        let msg = map.get("message").and_then(|m| m.as_str()).map(str::to_string);
        let value = map.get("value").filter(|v| !v.is_none()).cloned();
        Some(Self::new(ErrorCode::parse_str(code), msg, value))
    }
}

impl Debug for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.err_type)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.msg {
            Some(msg) => write!(f, "{} ({msg})", self.err_type),
            None => write!(f, "{}", self.err_type),
        }
    }
}

impl From<ErrorCode> for Error {
    fn from(val: ErrorCode) -> Self {
        Error::new(val, None, None)
    }
}

impl PartialEq<ErrorCode> for Error {
    fn eq(&self, other: &ErrorCode) -> bool {
        self.err_type == *other
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, EnumString, IntoStaticStr)]
#[allow(non_camel_case_types)]
pub enum ErrorCode {
    E_NONE,
    E_TYPE,
    E_DIV,
    E_PERM,
    E_PROPNF,
    E_VERBNF,
    E_VARNF,
    E_INVIND,
    E_RECMOVE,
    E_MAXREC,
    E_RANGE,
    E_ARGS,
    E_INVARG,
    E_QUOTA,
    E_FLOAT,
    /// A method body failed to compile.
    E_COMPILE,
    #[strum(default)]
    ErrCustom(String),
}

impl ErrorCode {
    /// Error literals in method source are upper case, but raised codes are compared without
    /// regard to case.
    pub fn parse_str(s: &str) -> Self {
        let upper = s.to_uppercase();
        upper.parse().unwrap_or(ErrCustom(upper))
    }

    pub fn msg<S: ToString>(self, s: S) -> Error {
        Error::new(self, Some(s.to_string()), None)
    }

    pub fn with_msg<F>(self, f: F) -> Error
    where
        F: FnOnce() -> String,
    {
        Error::new(self, Some(f()), None)
    }

    pub fn with_msg_and_value<F>(self, f: F, value: Var) -> Error
    where
        F: FnOnce() -> String,
    {
        Error::new(self, Some(f()), Some(value))
    }
}

impl Display for ErrorCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrCustom(name) => write!(f, "{name}"),
            code => {
                let name: &'static str = code.into();
                write!(f, "{name}")
            }
        }
    }
}
