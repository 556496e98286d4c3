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

//! The live world: objects loaded through a per-process cache, resolved along their prototype
//! chains, and running method code on an embedded stack VM.

pub use crate::bootstrap::{BootstrapReport, bootstrap};
pub use crate::config::KernelConfig;
pub use crate::engine::{CompiledMethod, Engine, ExecutionContext};
pub use crate::manager::{CreateSpec, ObjectManager};
pub use crate::object::ObjectHandle;
pub use crate::registry::Registry;
pub use crate::resolver::{Resolver, WorldCache};

pub mod aliases;
mod bootstrap;
pub mod config;
mod engine;
mod manager;
mod object;
pub mod registry;
pub mod resolver;
pub mod vm;
