/* This file is part of ZeroTrace
 *
 * ZeroTrace is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as
 * published by the Free Software Foundation, either version 3 of the
 * License, or (at your option) any later version.
 */

//! `zerotraced` — the ZeroTrace node daemon. Bootstrap grounded on the
//! teacher's `example/dchat/src/main.rs` thread-pool pattern
//! (`easy_parallel::Parallel` driving a fixed-size `smol::Executor` pool)
//! combined with `script/research/dhtd`'s `ctrlc` + bounded-channel shutdown
//! signal, since this binary does not depend on the `darkfi` crate itself
//! and so cannot use its `async_daemonize!` macro.

mod menu;
mod settings;

use std::{fs::File, path::Path};

use async_std::sync::Arc;
use easy_parallel::Parallel;
use log::{error, info, LevelFilter};
use simplelog::{ColorChoice, CombinedLogger, Config as LogConfig, TermLogger, TerminalMode, WriteLogger};
use smol::Executor;
use structopt::StructOpt;
use structopt_toml::StructOptToml;

use zerotrace::{
    dht::{kademlia::Kademlia, kbucket::node_id_from_identifier},
    error::{Error, Result},
    net::{overlay::OverlayInfo, transport},
    store::{DhtStores, MessageStores},
    Node,
};

use settings::{Args, CONFIG_FILE, CONFIG_FILE_CONTENTS};

fn init_logger(args: &Args) -> Result<()> {
    let level = match args.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    match &args.log {
        Some(path) => {
            let file = File::create(path)?;
            WriteLogger::init(level, LogConfig::default(), file)
                .map_err(|e| Error::Custom(format!("failed to init logger: {e}")))?;
        }
        None => {
            CombinedLogger::init(vec![TermLogger::new(
                level,
                LogConfig::default(),
                TerminalMode::Mixed,
                ColorChoice::Auto,
            )])
            .map_err(|e| Error::Custom(format!("failed to init logger: {e}")))?;
        }
    }
    Ok(())
}

fn default_config_path() -> Result<std::path::PathBuf> {
    let base = shellexpand::tilde("~/.config/zerotrace").into_owned();
    Ok(std::path::PathBuf::from(base).join(CONFIG_FILE))
}

/// Writes the embedded default config to disk on first run and reads
/// whatever ends up there — mirrors the teacher's `spawn_config` convention
/// of a config file that's created once and then left for the user to edit.
fn spawn_config(path: &Path) -> Result<()> {
    if !path.exists() {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, CONFIG_FILE_CONTENTS)?;
    }
    Ok(())
}

fn load_args() -> Result<Args> {
    let pre_args = Args::from_args();
    let config_path = match &pre_args.config {
        Some(p) => std::path::PathBuf::from(shellexpand::tilde(p).into_owned()),
        None => default_config_path()?,
    };
    spawn_config(&config_path)?;

    let toml_contents = std::fs::read_to_string(&config_path)?;
    Args::from_args_with_toml(&toml_contents)
        .map_err(|e| Error::Custom(format!("failed to parse config: {e}")))
}

fn prompt_password(confirm: bool) -> Result<String> {
    let password = rpassword::prompt_password("keystore password: ")
        .map_err(|e| Error::Custom(format!("failed to read password: {e}")))?;
    if confirm {
        let again = rpassword::prompt_password("confirm password: ")
            .map_err(|e| Error::Custom(format!("failed to read password: {e}")))?;
        if password != again {
            return Err(Error::Custom("passwords did not match".into()));
        }
    }
    Ok(password)
}

/// Unlocks the keystore, retrying interactively up to three times before
/// giving up with a non-zero exit (spec §6 "Non-zero exit on ... wrong
/// password after interactive retry limit").
fn unlock_or_create_identity(data_dir: &Path) -> Result<zerotrace::crypto::identity::Identity> {
    let path = zerotrace::crypto::identity::default_keystore_path(data_dir);
    if !path.exists() {
        info!("no keystore found at {}; creating a new identity", path.display());
        let password = prompt_password(true)?;
        return zerotrace::crypto::identity::create(&path, &password);
    }

    const MAX_ATTEMPTS: u32 = 3;
    for attempt in 1..=MAX_ATTEMPTS {
        let password = prompt_password(false)?;
        match zerotrace::crypto::identity::unlock(&path, &password) {
            Ok(identity) => return Ok(identity),
            Err(Error::WrongPassword) if attempt < MAX_ATTEMPTS => {
                println!("wrong password, {} attempt(s) left", MAX_ATTEMPTS - attempt);
            }
            Err(e) => return Err(e),
        }
    }
    Err(Error::WrongPassword)
}

/// Runs the four DHT maintenance loops plus the seen-set sweeper as
/// independent cancellation-token-bound tasks (spec §4.5, §9 "Coroutines").
fn spawn_maintenance_loops(ex: &Arc<Executor<'static>>, node: zerotrace::NodePtr, stop: zerotrace::system::StopSignal) {
    use async_std::future::timeout;
    use std::time::Duration;

    macro_rules! spawn_loop {
        ($name:expr, $interval:expr, $body:expr) => {
            let node = node.clone();
            let stop = stop.clone();
            ex.spawn(async move {
                loop {
                    if timeout(Duration::from_secs($interval), stop.wait()).await.is_ok() {
                        info!(target: "zerotraced", "{} loop stopping", $name);
                        return;
                    }
                    if let Err(e) = $body(&node).await {
                        error!(target: "zerotraced", "{} loop iteration failed: {e}", $name);
                    }
                }
            })
            .detach();
        };
    }

    async fn refresh(node: &zerotrace::NodePtr) -> Result<()> {
        node.dht.refresh_stale_buckets(60 * 60).await
    }
    async fn replicate(node: &zerotrace::NodePtr) -> Result<()> {
        node.dht.replicate_all().await
    }
    async fn expire(node: &zerotrace::NodePtr) -> Result<()> {
        node.dht.expire_and_republish().await
    }
    async fn liveness(node: &zerotrace::NodePtr) -> Result<()> {
        node.dht.check_liveness(15 * 60).await
    }
    async fn sweep(node: &zerotrace::NodePtr) -> Result<()> {
        zerotrace::routing::sweep_seen_set(node).await.map(|_| ())
    }

    spawn_loop!("bucket refresh", 60 * 60, refresh);
    spawn_loop!("replication", 60 * 60, replicate);
    spawn_loop!("expiration", 6 * 60 * 60, expire);
    spawn_loop!("liveness", 5 * 60, liveness);
    spawn_loop!("seen-set sweep", 60 * 60, sweep);
}

fn main() -> Result<()> {
    let args = load_args()?;
    init_logger(&args)?;

    let data_dir = args.data_dir_path();
    std::fs::create_dir_all(&data_dir)?;

    let identity = unlock_or_create_identity(&data_dir)?;
    info!("node identifier: {}", identity.identifier);

    let overlay = if args.no_i2p {
        info!("--no-i2p set; falling back to developer-mode direct HTTP");
        OverlayInfo::dev_mode(args.bind_addr())
    } else {
        OverlayInfo::read(&data_dir)?
    };
    transport::install_proxy(&overlay.proxy_endpoint);

    let (stop_handle, stop_signal) = zerotrace::system::stop_signal();
    zerotrace::system::install_signal_handler(stop_handle)?;

    let ex = Arc::new(Executor::new());
    let bind_addr = args.bind_addr();
    let server_only = args.server_only;
    let bootstrap_peers = args.bootstrap.clone();

    let nthreads = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4);
    let (signal, shutdown) = smol::channel::unbounded::<()>();

    let (_, result) = Parallel::new()
        .each(0..nthreads, |_| {
            let ex = ex.clone();
            let shutdown = shutdown.clone();
            smol::future::block_on(ex.run(shutdown.recv()))
        })
        .finish(|| {
            smol::future::block_on(async move {
                let messages = MessageStores::open(&data_dir.join("zerotrace.db")).await?;
                let dht_stores = DhtStores::open(&data_dir.join("zerotrace_dht.db")).await?;

                let self_id = node_id_from_identifier(&identity.identifier);
                let transport_impl = Arc::new(transport::HttpDhtTransport);
                let kademlia = Kademlia::new(self_id, dht_stores.dht.clone(), transport_impl);

                let node = Node::new(
                    identity,
                    overlay,
                    messages.contacts,
                    messages.inbox,
                    messages.forward_queue,
                    messages.seen_set,
                    kademlia,
                    dht_stores.dht,
                );

                for peer in &bootstrap_peers {
                    if let Ok(id_hex) = transport::get_id(peer).await {
                        if let Ok(bytes) = hex::decode(&id_hex) {
                            if let Ok(node_id): std::result::Result<[u8; 32], _> = bytes.try_into() {
                                node.dht
                                    .table
                                    .insert_or_refresh(zerotrace::dht::kbucket::Contact {
                                        node_id,
                                        address: peer.clone(),
                                        last_seen: zerotrace::util::now_unix(),
                                    })
                                    .await;
                            }
                        }
                    }
                }

                spawn_maintenance_loops(&ex, node.clone(), stop_signal.clone());

                let server_node = node.clone();
                let server_ex = ex.clone();
                server_ex
                    .spawn(async move {
                        if let Err(e) = transport::serve(server_node, &bind_addr).await {
                            error!(target: "zerotraced", "transport server stopped: {e}");
                        }
                    })
                    .detach();

                if !server_only {
                    menu::run(node).await;
                } else {
                    stop_signal.wait().await;
                }

                drop(signal);
                Ok::<(), Error>(())
            })
        });

    result
}
