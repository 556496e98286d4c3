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

use clap::builder::ValueHint;
use clap_derive::{Parser, Subcommand};
use eyre::eyre;
use figment::Figment;
use figment::providers::{Format as ProviderFormat, Serialized, Yaml};
use protocosm_common::model::Privilege;
use protocosm_db::DatabaseConfig;
use protocosm_kernel::KernelConfig;
use protocosm_rpc::RpcConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Everything the configuration file can set.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub kernel: KernelConfig,
    pub rpc: RpcConfig,
}

#[derive(Parser, Debug)]
#[command(name = "protocosm", version, about = "Inspect and operate on a protocosm world")]
pub struct Args {
    #[arg(
        value_name = "data-dir",
        help = "Directory holding the world's object store",
        value_hint = ValueHint::DirPath,
        default_value = "./protocosm-data"
    )]
    pub data_dir: PathBuf,

    #[arg(
        long,
        value_name = "config",
        help = "Path to configuration (YAML) file to use, if any. If not specified, defaults are used.\
                Configuration file values can be overridden by command line arguments.",
        value_hint = ValueHint::FilePath
    )]
    pub config_file: Option<PathBuf>,

    #[arg(long, help = "Enable debug logging")]
    pub debug: bool,

    #[arg(
        long,
        help = "Use the store served by `protocosm serve` at the RPC endpoints instead of opening \
                data-dir"
    )]
    pub connect: bool,

    #[command(flatten)]
    pub rpc_args: RpcArgs,

    #[command(flatten)]
    pub kernel_args: KernelArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Parser, Debug)]
pub struct KernelArgs {
    #[arg(
        long,
        value_name = "privilege",
        help = "Privilege to act with: player, builder or wizard",
        default_value = "wizard"
    )]
    pub privilege: Privilege,

    #[arg(long, help = "Load every live object into the cache at startup")]
    pub preload: Option<bool>,

    #[arg(
        long,
        value_name = "depth",
        help = "How deeply method calls may nest before raising E_MAXREC"
    )]
    pub max_call_depth: Option<usize>,
}

impl KernelArgs {
    pub fn merge_config(&self, config: &mut KernelConfig) {
        if let Some(preload) = self.preload {
            config.preload_on_start = preload;
        }
        if let Some(depth) = self.max_call_depth {
            config.max_call_depth = depth;
        }
    }
}

#[derive(Parser, Debug)]
pub struct RpcArgs {
    #[arg(
        long,
        value_name = "rpc-endpoint",
        help = "ZMQ endpoint store requests are served on"
    )]
    pub rpc_endpoint: Option<String>,

    #[arg(
        long,
        value_name = "events-endpoint",
        help = "ZMQ endpoint committed changes are published on"
    )]
    pub events_endpoint: Option<String>,
}

impl RpcArgs {
    pub fn merge_config(&self, config: &mut RpcConfig) {
        if let Some(endpoint) = &self.rpc_endpoint {
            config.rpc_endpoint = endpoint.clone();
        }
        if let Some(endpoint) = &self.events_endpoint {
            config.events_endpoint = endpoint.clone();
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the store in data-dir to other processes until interrupted.
    Serve,
    /// Create the system object, root prototype and recycler where missing.
    Bootstrap,
    /// Print an object's stored document.
    Show { id: i64 },
    /// Read a property, inherited or not.
    Get { id: i64, property: String },
    /// Write a property on the object itself. The value is JSON; `{"objref": n}` is a reference.
    Set {
        id: i64,
        property: String,
        value: String,
    },
    /// Invoke a method. Arguments are JSON values.
    Call {
        id: i64,
        method: String,
        args: Vec<String>,
    },
    /// List registered aliases.
    Aliases,
    /// Point an alias at an object.
    Alias { name: String, id: i64 },
    /// List objects.
    List {
        #[arg(long)]
        include_recycled: bool,
    },
    Recycle { id: i64 },
    /// Delete an object outright, without a recycler snapshot.
    Purge { id: i64 },
    /// Print object cache statistics.
    Stats,
}

impl Args {
    /// Load the configuration file if we have it, then apply command line overrides.
    pub fn load_config(&self) -> Result<Config, eyre::Report> {
        let mut config = match &self.config_file {
            Some(config_path) => Figment::new()
                .merge(Serialized::defaults(Config::default()))
                .merge(Yaml::file(config_path))
                .extract::<Config>()
                .map_err(|e| {
                    eyre!(
                        "Failed to parse configuration from {:?}: {}",
                        config_path,
                        e
                    )
                })?,
            None => Config::default(),
        };
        self.kernel_args.merge_config(&mut config.kernel);
        self.rpc_args.merge_config(&mut config.rpc);
        Ok(config)
    }
}
