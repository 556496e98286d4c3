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

//! The method virtual machine. A `MethodFrame` runs compiled opcodes until it completes, raises,
//! runs out of ticks, or needs something from the host (a property, a method call, the registry).
//! The host services the request and resumes the frame with the answer.

use protocosm_var::{Error, Obj, Var};
use std::time::Duration;

pub use frame::MethodFrame;

pub mod builtins;
mod execute;
mod frame;

/// Something only the host can do. The frame is left positioned just past the instruction that
/// asked; `MethodFrame::resume` pushes the answer and `MethodFrame::resume_exception` raises
/// inside the frame instead.
#[derive(Clone, Debug, PartialEq)]
pub enum HostRequest {
    GetProp {
        obj: Obj,
        name: String,
    },
    PutProp {
        obj: Obj,
        name: String,
        value: Var,
    },
    CallMethod {
        obj: Obj,
        name: String,
        args: Vec<Var>,
    },
    /// `registry:op(args...)`
    Registry {
        op: String,
        args: Vec<Var>,
    },
    ResolveAlias(String),
    /// Give up the thread for at least this long.
    Suspend(Duration),
}

/// Where a slice of execution stopped.
#[derive(Clone, Debug, PartialEq)]
pub enum ExecutionResult {
    /// The method returned.
    Complete(Var),
    /// An error was raised and no handler in the frame caught it.
    Exception(Error),
    Request(HostRequest),
    /// The tick slice was used up; call `run` again once other tasks had a turn.
    Yield,
}
