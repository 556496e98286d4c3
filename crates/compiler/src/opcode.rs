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

use crate::builtins::BuiltinId;
use crate::labels::Label;
use crate::names::Name;

#[derive(Clone, Debug, PartialEq, Eq, Ord, PartialOrd)]
pub enum Op {
    If(Label),
    Eif(Label),
    IfQues(Label),
    While(Label),
    Jump {
        label: Label,
    },
    /// Bind `id` to the next element of the sequence held in `list`, or jump to `end_label` once
    /// `position` has run off its end.
    ForList {
        id: Name,
        list: Name,
        position: Name,
        end_label: Label,
    },
    ForRange {
        id: Name,
        position: Name,
        end: Name,
        end_label: Label,
    },
    Pop,
    ImmNone,
    ImmInt(i64),
    ImmEmptyList,
    ImmEmptyMap,
    Imm(Label),
    ListAddTail,
    MakeSingletonList,
    MapInsert,
    IndexSet,
    PutTemp,
    PushTemp,
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
    In,
    Mul,
    Sub,
    Div,
    Mod,
    Add,
    Exp,
    And(Label),
    Or(Label),
    Not,
    UnaryMinus,
    Ref,
    Push(Name),
    PushRef,
    Put(Name),
    RangeRef,
    GetProp,
    PushGetProp,
    PutProp,
    CallMethod,
    CallRegistry,
    /// Push the identity the literal alias name at `Label` currently maps to.
    PushAlias(Label),
    FuncCall {
        id: BuiltinId,
    },
    TryExcept {
        handler: Label,
    },
    EndExcept(Label),
    /// Compare the code list on top of the stack against the caught error beneath it, jumping to
    /// the label when no code matches.
    ExceptMatch(Label),
    Reraise,
    /// Leave a loop from inside `handlers` nested try blocks.
    Exit {
        label: Label,
        handlers: u16,
    },
    Return,
    Return0,
    Done,
}
