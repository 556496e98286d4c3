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

use strum::{Display, EnumIter, IntoEnumIterator};

/// A Name is a unique identifier for a variable in the program's environment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Name(pub u16);

/// Variables bound by the engine when a method starts, in environment order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display, EnumIter)]
#[allow(non_camel_case_types)]
pub enum GlobalName {
    this,
    args,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Names {
    /// The list of names in the program, in order of their appearance, with the offsets into the
    /// vector being the unique identifier for the name.
    names: Vec<String>,
    registers: u16,
}

impl Default for Names {
    fn default() -> Self {
        Self::new()
    }
}

impl Names {
    pub fn new() -> Self {
        let mut names = Self {
            names: vec![],
            registers: 0,
        };
        for global in GlobalName::iter() {
            names.find_or_add_name(global.to_string().as_str());
        }
        names
    }

    /// Add a name to the name table, if it doesn't already exist.
    /// If it does exist, return the existing name.
    pub fn find_or_add_name(&mut self, name: &str) -> Name {
        match self.names.iter().position(|n| n == name) {
            None => {
                let pos = self.names.len();
                self.names.push(name.to_string());
                Name(pos as u16)
            }
            Some(n) => Name(n as u16),
        }
    }

    /// Allocate an anonymous slot for compiler bookkeeping (loop state). Its name can never
    /// collide with an identifier from source.
    pub fn declare_register(&mut self) -> Name {
        let name = format!("*r{}*", self.registers);
        self.registers += 1;
        self.find_or_add_name(&name)
    }

    pub fn find_name(&self, name: &str) -> Option<Name> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|x| Name(x as u16))
    }

    /// True for the engine-provided context variables, which method code may not assign.
    pub fn is_global(&self, name: Name) -> bool {
        (name.0 as usize) < GlobalName::iter().count()
    }

    /// Return the width of the name table, to be used as the (total) environment size.
    pub fn width(&self) -> usize {
        self.names.len()
    }

    pub fn name_of(&self, name: &Name) -> Option<&str> {
        self.names.get(name.0 as usize).map(|s| s.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_globals_come_first() {
        let mut names = Names::new();
        assert_eq!(names.find_name("this"), Some(Name(GlobalName::this as u16)));
        assert_eq!(names.find_name("args"), Some(Name(GlobalName::args as u16)));
        let x = names.find_or_add_name("x");
        assert_eq!(x, Name(2));
        assert_eq!(names.find_or_add_name("x"), x);
        assert!(names.is_global(Name(1)));
        assert!(!names.is_global(x));
    }

    #[test]
    fn test_registers_are_distinct() {
        let mut names = Names::new();
        let a = names.declare_register();
        let b = names.declare_register();
        assert_ne!(a, b);
        assert_eq!(names.width(), 4);
        assert_eq!(names.find_name("*r0*"), Some(a));
    }
}
