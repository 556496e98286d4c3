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

mod args;

use crate::args::{Args, Command, Config};
use clap::Parser;
use eyre::eyre;
use protocosm_common::tracing::init_tracing;
use protocosm_db::{FjallStore, ObjectStore};
use protocosm_kernel::{ObjectHandle, ObjectManager, bootstrap};
use protocosm_rpc::{RemoteStore, StoreServer};
use protocosm_var::{Obj, Var};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use tracing::{info, warn};

fn parse_value(json: &str) -> Result<Var, eyre::Report> {
    serde_json::from_str(json).map_err(|e| eyre!("Invalid JSON value {json:?}: {e}"))
}

fn load(manager: &Arc<ObjectManager>, id: i64) -> Result<ObjectHandle, eyre::Report> {
    let obj = Obj::mk_id(id);
    manager
        .load(obj)?
        .ok_or_else(|| eyre!("{obj} does not exist or was recycled"))
}

async fn run(manager: &Arc<ObjectManager>, args: &Args) -> Result<(), eyre::Report> {
    let privilege = args.kernel_args.privilege;
    match &args.command {
        Command::Serve => return Err(eyre!("`serve` runs without an object manager")),
        Command::Bootstrap => {
            let report = bootstrap(manager)?;
            if report.is_noop() {
                println!("Already bootstrapped");
            }
            for id in &report.created {
                println!("created {id}");
            }
            for (id, property) in &report.merged_properties {
                println!("added {id}.{property}");
            }
            for name in &report.registered_aliases {
                println!("registered ${name}");
            }
        }
        Command::Show { id } => {
            let obj = Obj::mk_id(*id);
            let handle = manager
                .load_including_recycled(obj)?
                .ok_or_else(|| eyre!("{obj} does not exist"))?;
            println!("{}", serde_json::to_string_pretty(handle.document())?);
        }
        Command::Get { id, property } => {
            let handle = load(manager, *id)?;
            match handle.get(property)? {
                Some(value) => println!("{}", value.to_literal()),
                None => return Err(eyre!("{}.{property} is not defined", handle.id())),
            }
        }
        Command::Set {
            id,
            property,
            value,
        } => {
            let value = parse_value(value)?;
            let mut handle = load(manager, *id)?;
            handle.set(property, value);
            handle.save()?;
        }
        Command::Call { id, method, args } => {
            let args = args
                .iter()
                .map(|a| parse_value(a))
                .collect::<Result<Vec<_>, _>>()?;
            let result = manager
                .call(Obj::mk_id(*id), method, args, privilege)
                .await?;
            println!("{}", result.to_literal());
        }
        Command::Aliases => {
            for (name, id) in manager.aliases() {
                println!("${name} -> {id}");
            }
        }
        Command::Alias { name, id } => {
            manager.register_alias(name, Obj::mk_id(*id))?;
        }
        Command::List { include_recycled } => {
            for doc in manager.list(*include_recycled)? {
                let name = doc
                    .properties
                    .get("name")
                    .map(|n| n.as_display_string())
                    .unwrap_or_default();
                let recycled = if doc.recycled { " (recycled)" } else { "" };
                println!("{}\tparent {}\t{name}{recycled}", doc.id, doc.parent);
            }
        }
        Command::Recycle { id } => manager.recycle(Obj::mk_id(*id), privilege)?,
        Command::Purge { id } => manager.purge(Obj::mk_id(*id), privilege)?,
        Command::Stats => {
            let stats = manager.cache_stats();
            println!("objects:       {}", stats.objects);
            println!("methods:       {}", stats.methods);
            println!("chains:        {}", stats.chains);
            println!("hits:          {}", stats.hits);
            println!("misses:        {}", stats.misses);
            println!("hit rate:      {:.2}", stats.hit_rate());
            println!("invalidations: {}", stats.invalidations);
            println!("preloads:      {}", stats.preloads);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), eyre::Report> {
    let args = Args::parse();
    init_tracing(args.debug)?;
    let config = args.load_config()?;

    if let Command::Serve = args.command {
        return serve(&args, &config);
    }
    let store: Arc<dyn ObjectStore> = if args.connect {
        info!(endpoint = config.rpc.rpc_endpoint, "Using a served object store");
        Arc::new(RemoteStore::new(zmq::Context::new(), config.rpc.clone()))
    } else {
        Arc::new(open_store(&args, &config)?)
    };
    let manager = ObjectManager::start(store, config.kernel)?;
    let result = run(&manager, &args).await;
    manager.shutdown();
    result
}

fn open_store(args: &Args, config: &Config) -> Result<FjallStore, eyre::Report> {
    let (store, fresh) = FjallStore::open(&args.data_dir, &config.database)?;
    if fresh {
        info!(data_dir = ?args.data_dir, "Created a new object store; run `bootstrap` to populate it");
    }
    Ok(store)
}

/// Own the store in data-dir and answer requests for it until SIGINT or SIGTERM.
fn serve(args: &Args, config: &Config) -> Result<(), eyre::Report> {
    let store = open_store(args, config)?;
    let server = StoreServer::bind(
        &zmq::Context::new(),
        Arc::new(store),
        &config.rpc.rpc_endpoint,
        &config.rpc.events_endpoint,
    )?;
    let kill_switch = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGTERM, kill_switch.clone())?;
    signal_hook::flag::register(signal_hook::consts::SIGINT, kill_switch.clone())?;
    info!(
        rpc_endpoint = server.rpc_endpoint(),
        events_endpoint = server.events_endpoint(),
        "Serving object store"
    );
    server.serve(kill_switch)?;
    warn!("Object store server stopped");
    Ok(())
}
