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

pub use crate::cache::{CacheStats, ObjectCache, ParentChain};
pub use crate::config::{DatabaseConfig, FeedConfig};
pub use crate::feed::{ChangeFeed, ChangeListener, FeedWatcher, watch};
pub use crate::provider::Provider;
pub use crate::provider::fjall_provider::FjallProvider;
pub use crate::provider::memory_provider::MemoryProvider;
pub use crate::store::{DocumentStore, FjallStore, MemoryStore, ObjectStore};

mod cache;
mod config;
mod feed;
mod provider;
mod store;
