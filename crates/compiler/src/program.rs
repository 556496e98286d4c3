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

use crate::labels::{JumpLabel, Label};
use crate::names::{Name, Names};
use crate::opcode::Op;
use protocosm_var::Var;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// The result of compilation. The set of instructions, variable offsets, literals.
/// Cloning shares the compiled unit.
#[derive(Clone, Debug, PartialEq)]
pub struct Program(Arc<PrgInner>);

#[derive(Debug, PartialEq)]
pub struct PrgInner {
    /// All the literals referenced in this program.
    pub literals: Vec<Var>,
    /// All the jump offsets used in this program.
    pub jump_labels: Vec<JumpLabel>,
    /// All the variable names used in this program.
    pub var_names: Names,
    /// The actual program code.
    pub main_vector: Vec<Op>,
    /// As each statement is pushed, the line number is recorded, along with its offset in the main
    /// vector.
    pub line_number_spans: Vec<(usize, usize)>,
}

impl Program {
    pub fn new(inner: PrgInner) -> Self {
        Self(Arc::new(inner))
    }

    pub fn literals(&self) -> &[Var] {
        &self.0.literals
    }

    pub fn literal(&self, label: Label) -> Option<&Var> {
        self.0.literals.get(label.0 as usize)
    }

    pub fn jump_label(&self, label: Label) -> Option<&JumpLabel> {
        self.0.jump_labels.get(label.0 as usize)
    }

    pub fn var_names(&self) -> &Names {
        &self.0.var_names
    }

    pub fn main_vector(&self) -> &[Op] {
        &self.0.main_vector
    }

    pub fn find_var(&self, v: &str) -> Option<Name> {
        self.0.var_names.find_name(v)
    }

    /// The source line of the statement that emitted the opcode at `pc`.
    pub fn line_num_for_position(&self, pc: usize) -> Option<usize> {
        let mut last_line = None;
        for &(offset, line) in &self.0.line_number_spans {
            if offset > pc {
                break;
            }
            last_line = Some(line);
        }
        last_line
    }
}

impl Display for Program {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        // Write literals indexed by their offset #
        for (i, l) in self.0.literals.iter().enumerate() {
            writeln!(f, "L{}: {}", i, l.to_literal())?;
        }

        for (i, l) in self.0.jump_labels.iter().enumerate() {
            writeln!(f, "J{}: {}", i, l.position.0)?;
        }

        for i in 0..self.0.var_names.width() {
            if let Some(name) = self.0.var_names.name_of(&Name(i as u16)) {
                writeln!(f, "V{i}: {name}")?;
            }
        }

        // Display main vector (program); opcodes are indexed by their offset
        for (i, op) in self.0.main_vector.iter().enumerate() {
            writeln!(f, "{i}: {op:?}")?;
        }

        Ok(())
    }
}
